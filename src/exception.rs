pub mod asynchronous;
