pub mod check;
pub mod nvcamera;
pub mod stream;
