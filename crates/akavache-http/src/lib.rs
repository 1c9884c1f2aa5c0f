//! HTTP-download memoization on top of `akavache`.

mod memoizer;

pub use memoizer::{DownloadOptions, HttpMemoizer};
