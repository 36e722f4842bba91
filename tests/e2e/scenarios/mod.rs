mod discontinuity;
mod rebase_policy;
