pub mod article;
pub mod row;
pub mod statement;
