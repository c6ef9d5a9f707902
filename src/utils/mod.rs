pub mod api_response;
pub mod extract;
pub mod pagination;
