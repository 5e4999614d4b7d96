pub mod api_connection;
pub mod cli;
pub mod dish_aggregator;
pub mod ingredient_matcher;
pub mod nutrition_data;
pub mod quantity_parser;
pub mod recipe;
pub mod unit_conversion;
