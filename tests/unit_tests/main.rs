// Unit tests: route handlers, guards and fairings against in-memory fakes

#[path = "../test_utils.rs"]
mod test_utils;

mod fairings_tests;
mod guards_tests;
mod http_client_tests;
mod transaction_route_tests;
mod wallet_route_tests;
