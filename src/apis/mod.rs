pub mod worldbank;
