pub mod amortize;
pub mod eligibility;
pub mod lifecycle;
