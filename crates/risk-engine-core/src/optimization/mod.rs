pub mod mean_variance;
pub mod solver;

pub use mean_variance::{
    efficient_frontier, frontier_from_moments, optimize, optimize_moments, FrontierPoint,
    MarketMoments, OptimizationRequest, OptimizationResult, OptimizerSettings, WeightBounds,
};
