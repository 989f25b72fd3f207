pub mod arima;
pub mod clustering;
pub mod engagement;
pub mod forecast;
pub mod ranking;
pub mod sentiment;
pub mod tfidf;
pub mod timestamp;
pub mod tokenizer;
pub mod trends;
