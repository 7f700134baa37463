pub mod installation;
pub mod quote;
pub mod rate_limit;
pub mod user;
