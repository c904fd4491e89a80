pub mod client;
pub mod git_data;
pub mod pull_requests;
