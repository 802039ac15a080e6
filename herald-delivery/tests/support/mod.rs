// Not every suite uses every helper.
#![allow(dead_code)]

pub mod mock_http;
pub mod mock_smtp;
