//! End-to-end tests driving the HTTP application against mocked upstreams.
