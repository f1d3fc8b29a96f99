pub mod prepare_env;

/// RSA key pair for signing webhooks in tests, in the same formats the gateway uses.
pub const GATEWAY_TEST_PRIVATE_KEY: &str = include_str!("keys/gateway_test_private.pem");
pub const GATEWAY_TEST_PUBLIC_KEY: &str = include_str!("keys/gateway_test_public.pem");
