//! Cross-module tests for the forecasting pipeline.

mod integration_tests;
