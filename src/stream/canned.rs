//! Fixed markdown outputs shown by the fallback producer.

use crate::pipeline::phase::AgentDefinition;

const PLANNER: &str = "## Deployment Plan

1. **Package** the service as a container image with a multi-stage build.
2. **Registry**: push images to a private registry with scanning enabled.
3. **Compute**: run two replicas behind a load balancer with `/health` checks.
4. **Scaling**: scale out above 70% CPU and back in below 30%.
5. **Delivery**: build, push and roll out on every merge to `main`.";

const CODER: &str = "## Generated Configuration

### `deploy/service.yaml`
```yaml
service:
  name: app
  replicas: 2
  port: 8080
  health_check: /health
autoscaling:
  min: 2
  max: 10
  target_cpu: 70
```

### `.ci/deploy.yml`
```yaml
on:
  push:
    branches: [main]
jobs:
  deploy:
    steps:
      - run: make image push rollout
```";

const REVIEWER: &str = "## Review

| Check | Result |
|-------|--------|
| Secrets in source | none found |
| Image tags | immutable |
| Health checks | configured |
| Least privilege | execution role scoped to logs and registry |

**Verdict:** safe to apply. Consider pinning the base image digest.";

const EXPLAINER: &str = "## Summary

The service is packaged as a container, stored in a private registry and run
as two load-balanced replicas that scale with CPU. Every merge to `main`
rebuilds and rolls out the new version once health checks pass.";

const MONITOR: &str = "## Signals

| Service | Metric | Value | Threshold | Severity |
|---------|--------|-------|-----------|----------|
| checkout-api | p99 latency | 2400 ms | 800 ms | high |
| orders-db | connections | 97% | 90% | critical |
| batch-worker | idle hours | 312 | 168 | low |";

const REASON: &str = "## Root Cause Analysis

- **orders-db**: connection pool exhausted after the last release doubled
  worker concurrency. Confidence 0.91.
- **checkout-api**: latency follows the database saturation. Confidence 0.84.
- **batch-worker**: instance left running after a finished backfill. Confidence 0.95.";

const ACT: &str = "## Actions

- Stopped idle `batch-worker` instance (auto-fixed).
- Raised `checkout-api` request timeout alarm threshold review (no-op, advisory).
- `orders-db` pool change needs approval; forwarded for review.";

const ESCALATE: &str = "## Escalations

1. **orders-db** (critical): reduce worker concurrency from 64 to 32 and raise
   the pool limit. Requires operator approval.";

fn generic(agent: &AgentDefinition, request: &str) -> String {
    format!(
        "## {}\n\nProcessed request: _{}_\n\n- step completed in sandbox mode",
        agent.label,
        request.trim()
    )
}

/// Output for one agent, chosen by its short name.
pub fn canned_output(agent: &AgentDefinition, request: &str) -> String {
    let text = match agent.name.to_lowercase().as_str() {
        "planner" => PLANNER,
        "coder" => CODER,
        "reviewer" => REVIEWER,
        "explainer" => EXPLAINER,
        "monitor" => MONITOR,
        "reason" => REASON,
        "act" => ACT,
        "escalate" => ESCALATE,
        _ => return generic(agent, request),
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::phase::PipelineProfile;

    #[test]
    fn test_every_profile_agent_has_heading() {
        for profile in [PipelineProfile::Devops, PipelineProfile::Ops] {
            for agent in profile.agents() {
                let output = canned_output(&agent, "Deploy my app");
                assert!(output.starts_with("## "), "{} output lacks a heading", agent.name);
                assert_eq!(output.matches("```").count() % 2, 0, "unbalanced fence in {}", agent.name);
            }
        }
    }

    #[test]
    fn test_unknown_agent_gets_generic_output() {
        let agent = AgentDefinition::new("triage", "TriageAgent", "");
        let output = canned_output(&agent, " Check disk ");
        assert!(output.starts_with("## TriageAgent"));
        assert!(output.contains("_Check disk_"));
    }
}
