mod aggregator;

pub use aggregator::Aggregator;
