//! End-to-end scenario suite, exercised directly against storage/operators.
#[cfg(test)]
mod e2e_scenarios;
