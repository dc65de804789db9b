pub mod aggregator;

pub use aggregator::PortfolioAggregator;
