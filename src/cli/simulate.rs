//! `sigorg simulate`: replay a governance script against an in-memory store.
//!
//! Scripts are TOML. Principals are human labels; each label maps to
//! `Address::from_name(label)`. Time starts at `start_time` (default 0) and
//! only moves on `advance` steps.
//!
//! ```toml
//! [organization]
//! name = "acme"
//! creator = "founder"
//!
//! [policy]
//! kind = "threshold"
//! members = ["alice", "bob", "carol"]
//! threshold = 2
//!
//! [[steps]]
//! action = "initialize"
//! by = "founder"
//!
//! [[steps]]
//! action = "propose"
//! by = "alice"
//! grant = ["dave"]
//! ttl = "48h"
//! ```

use super::config::SigorgConfig;
use serde::{Deserialize, Serialize};
use sigorg::proposals::format_proposal_with;
use sigorg::organization::organization_address;
use sigorg::{
    Address, Clock, Governance, GovernanceError, Instruction, ManualClock, MemoryStore,
    PolicyConfig, Principal, RegrantBehavior,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    pub organization: OrganizationSpec,
    pub policy: PolicySpec,

    #[serde(default)]
    pub start_time: u64,

    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrganizationSpec {
    pub name: String,
    pub creator: String,

    /// Overrides `[governance] regrant` from the operator config.
    pub regrant: Option<RegrantBehavior>,

    /// Overrides `[governance] default_proposal_ttl_secs`.
    pub default_ttl: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicySpec {
    Single {
        authority: String,
    },
    Threshold {
        members: Vec<String>,
        threshold: u32,
    },
    Weighted {
        weights: BTreeMap<String, u64>,
        quorum: u64,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Initialize {
        by: String,
    },
    Propose {
        by: String,
        #[serde(default)]
        grant: Vec<String>,
        #[serde(default)]
        revoke: Vec<String>,
        ttl: Option<String>,
    },
    Approve {
        proposal: u64,
        by: String,
    },
    Execute {
        proposal: u64,
    },
    /// Create, approve and execute in one go.
    Apply {
        by: String,
        #[serde(default)]
        grant: Vec<String>,
        #[serde(default)]
        revoke: Vec<String>,
    },
    Transfer {
        from: String,
        to: String,
        #[serde(default = "one")]
        amount: u64,
    },
    Expire {
        proposal: u64,
    },
    Advance {
        by: String,
    },
    Show,
}

fn one() -> u64 {
    1
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Initialize { .. } => "initialize",
            Step::Propose { .. } => "propose",
            Step::Approve { .. } => "approve",
            Step::Execute { .. } => "execute",
            Step::Apply { .. } => "apply",
            Step::Transfer { .. } => "transfer",
            Step::Expire { .. } => "expire",
            Step::Advance { .. } => "advance",
            Step::Show => "show",
        }
    }
}

/// Outcome of one script step.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: usize,
    pub action: String,
    pub ok: bool,
    pub detail: String,
}

impl Script {
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read script '{}': {}", path.display(), e))?;
        let script = Self::parse(&contents)
            .map_err(|e| format!("Failed to parse script '{}': {}", path.display(), e))?;
        Ok(script)
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    humantime::parse_duration(text).map_err(|e| format!("invalid duration '{}': {}", text, e))
}

/// Replay state: the governance service plus the label book.
struct Simulation {
    governance: Governance<MemoryStore, ManualClock>,
    clock: ManualClock,
    organization: Address,
    labels: BTreeMap<Address, String>,
}

impl Simulation {
    fn principal(&mut self, label: &str) -> Principal {
        let address = Address::from_name(label);
        self.labels.entry(address).or_insert_with(|| label.to_string());
        address
    }

    /// A principal's label, or its short form when it has none.
    fn name(&self, address: &Address) -> String {
        self.labels
            .get(address)
            .cloned()
            .unwrap_or_else(|| address.short())
    }

    /// Error text with labelled principals shown by label.
    fn describe(&self, error: &GovernanceError) -> String {
        let mut text = error.to_string();
        for (address, label) in &self.labels {
            text = text.replace(&address.to_string(), label);
        }
        text
    }

    fn batch(&mut self, grant: &[String], revoke: &[String]) -> Vec<Instruction> {
        let grants: Vec<Instruction> = grant
            .iter()
            .map(|l| Instruction::grant(self.principal(l)))
            .collect();
        let revokes: Vec<Instruction> = revoke
            .iter()
            .map(|l| Instruction::revoke(self.principal(l)))
            .collect();
        grants.into_iter().chain(revokes).collect()
    }

    fn policy(&mut self, spec: &PolicySpec) -> PolicyConfig {
        match spec {
            PolicySpec::Single { authority } => PolicyConfig::single(self.principal(authority)),
            PolicySpec::Threshold { members, threshold } => {
                let members: Vec<Principal> = members.iter().map(|m| self.principal(m)).collect();
                PolicyConfig::threshold(members, *threshold)
            }
            PolicySpec::Weighted { weights, quorum } => {
                let weights: Vec<(Principal, u64)> = weights
                    .iter()
                    .map(|(label, weight)| (self.principal(label), *weight))
                    .collect();
                PolicyConfig::weighted(weights, *quorum)
            }
        }
    }

    async fn run_step(&mut self, step: &Step) -> Result<String, String> {
        let org = self.organization;

        match step {
            Step::Initialize { by } => {
                let caller = self.principal(by);
                let record = self
                    .governance
                    .initialize(&org, &caller)
                    .await
                    .map_err(|e| self.describe(&e))?;
                Ok(format!("freeze controller {}", record.address.short()))
            }
            Step::Propose {
                by,
                grant,
                revoke,
                ttl,
            } => {
                let creator = self.principal(by);
                let instructions = self.batch(grant, revoke);
                let ttl = ttl.as_deref().map(parse_duration).transpose()?;
                let proposal = self
                    .governance
                    .create_proposal(&org, &creator, instructions, ttl)
                    .await
                    .map_err(|e| self.describe(&e))?;
                Ok(format!(
                    "proposal #{} with {} instruction(s)",
                    proposal.index,
                    proposal.instructions.len()
                ))
            }
            Step::Approve { proposal, by } => {
                let approver = self.principal(by);
                let proposal = self
                    .governance
                    .approve(&org, *proposal, &approver)
                    .await
                    .map_err(|e| self.describe(&e))?;
                Ok(format!(
                    "proposal #{} has {} approval(s)",
                    proposal.index,
                    proposal.approval_count()
                ))
            }
            Step::Execute { proposal } => {
                let proposal = self
                    .governance
                    .execute(&org, *proposal)
                    .await
                    .map_err(|e| self.describe(&e))?;
                Ok(format!("proposal #{} {}", proposal.index, proposal.status))
            }
            Step::Apply { by, grant, revoke } => {
                let caller = self.principal(by);
                let instructions = self.batch(grant, revoke);
                let proposal = self
                    .governance
                    .create_and_execute(&org, &caller, instructions)
                    .await
                    .map_err(|e| self.describe(&e))?;
                Ok(format!("proposal #{} {}", proposal.index, proposal.status))
            }
            Step::Transfer { from, to, amount } => {
                let owner = self.principal(from);
                let recipient = self.principal(to);
                self.governance
                    .transfer(&org, &owner, &recipient, *amount)
                    .await
                    .map_err(|e| self.describe(&e))?;
                Ok(format!("moved {} token(s) from {} to {}", amount, from, to))
            }
            Step::Expire { proposal } => {
                let proposal = self
                    .governance
                    .expire(&org, *proposal)
                    .await
                    .map_err(|e| self.describe(&e))?;
                Ok(format!("proposal #{} {}", proposal.index, proposal.status))
            }
            Step::Advance { by } => {
                let by = parse_duration(by)?;
                self.clock.advance(by);
                Ok(format!("t={}", self.clock.now()))
            }
            Step::Show => self.show().await.map_err(|e| self.describe(&e)),
        }
    }

    async fn show(&self) -> Result<String, GovernanceError> {
        let org = self.governance.organization(&self.organization).await?;
        let mut output = format!(
            "organization {} ({}), next proposal #{}, controller {}\n",
            org.name,
            org.address.short(),
            org.next_proposal_index,
            org.controller
                .map(|c| c.short())
                .unwrap_or_else(|| "not initialized".to_string())
        );

        for (address, label) in &self.labels {
            let membership = self.governance.membership(&org.address, address).await?;
            output.push_str(&format!(
                "  {:<12} member={} balance={} frozen={}\n",
                label,
                membership.is_member(),
                membership.balance(),
                membership.is_frozen()
            ));
        }
        for proposal in self.governance.proposals(&org.address).await? {
            output.push_str(&format_proposal_with(&proposal, |a| self.name(a)));
        }
        Ok(output.trim_end().to_string())
    }
}

/// Replay `script`. Fails only if the organization cannot be set up; step
/// failures are reported and the run continues.
pub async fn run(
    script: &Script,
    config: &SigorgConfig,
) -> Result<Vec<StepReport>, Box<dyn std::error::Error>> {
    let clock = ManualClock::new(script.start_time);
    let governance = Governance::with_clock(Arc::new(MemoryStore::new()), clock.clone());

    let mut settings = config.governance.settings();
    if let Some(regrant) = script.organization.regrant {
        settings.regrant = regrant;
    }
    if let Some(ttl) = &script.organization.default_ttl {
        settings.default_proposal_ttl_secs = Some(parse_duration(ttl)?.as_secs());
    }

    let creator = Address::from_name(&script.organization.creator);
    let mut sim = Simulation {
        governance,
        clock,
        organization: organization_address(&creator, &script.organization.name),
        labels: BTreeMap::new(),
    };
    sim.principal(&script.organization.creator);
    let policy = sim.policy(&script.policy);

    sim.governance
        .create_organization(&creator, &script.organization.name, policy, settings)
        .await?;

    let mut reports = Vec::with_capacity(script.steps.len());
    for (i, step) in script.steps.iter().enumerate() {
        let outcome = sim.run_step(step).await;
        let (ok, detail) = match outcome {
            Ok(detail) => (true, detail),
            Err(error) => (false, error),
        };
        reports.push(StepReport {
            step: i + 1,
            action: step.name().to_string(),
            ok,
            detail,
        });
    }
    Ok(reports)
}

/// `sigorg simulate`
pub async fn execute(
    script_path: String,
    config_path: Option<String>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = SigorgConfig::resolve(config_path.as_deref().map(Path::new))?;
    super::init_logging(&config.logging)?;

    let script = Script::load(Path::new(&script_path))?;
    let reports = run(&script, &config).await?;

    for report in &reports {
        if json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            let mark = if report.ok { "ok " } else { "ERR" };
            println!("[{:>3}] {} {:<10} {}", report.step, mark, report.action, report.detail);
        }
    }
    Ok(())
}
