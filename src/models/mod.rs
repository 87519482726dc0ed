pub mod efficientnet;

pub use efficientnet::ClassifierModel;
