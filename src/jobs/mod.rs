//! Job-graph construction: task schema, price graphs, deployment assembly.

pub mod assembler;
pub mod price;
pub mod task;

pub use assembler::{assemble, assemble_jobs, AssetSpec, FeedDeployment, StakePoolTemplates};
pub use price::{PoolFallbackSpec, PriceDirection, SwapQuoteSpec};
pub use task::{OracleJob, Task, WeightedJob};
