pub mod gateway;
pub mod response;

pub use gateway::gateway_middleware;
pub use response::{ApiResponse, ApiResult};
