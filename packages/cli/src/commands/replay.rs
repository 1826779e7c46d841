use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use entityverse_common::SequentialIds;
use entityverse_env::{EntityLocalEnv, EnvConfig, SyncEvent};
use entityverse_view::{EntityView, ViewSpaceRegistry};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::pin::Pin;
use tracing::{debug, info, warn};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON script: an array of steps
    pub script: PathBuf,

    /// Directory containing entityverse.config.json (defaults to cwd)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Pretty-print every sync event instead of one JSON line each
    #[arg(short, long)]
    pub pretty: bool,

    /// Generate reproducible ids from this label instead of random uuids
    #[arg(short, long)]
    pub seed: Option<String>,
}

/// One scripted mutation; entities are addressed by script-local aliases
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    Create {
        alias: String,
        /// Defaults to the alias
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        order: f64,
        /// Explicit entity id
        #[serde(default)]
        id: Option<String>,
    },
    SetParent {
        alias: String,
        /// `null` or absent makes the entity a root
        #[serde(default)]
        parent: Option<String>,
    },
    RemoveFromParent {
        alias: String,
    },
    SetOrder {
        alias: String,
        order: f64,
    },
    SetProperty {
        alias: String,
        name: String,
        value: Value,
    },
    RemoveProperty {
        alias: String,
        name: String,
    },
    Destroy {
        alias: String,
    },
    DestroySubtree {
        alias: String,
    },
    /// Mark the environment ready; scripts without it start ready
    Start,
    Sync,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::Create { .. } => "create",
            Step::SetParent { .. } => "setParent",
            Step::RemoveFromParent { .. } => "removeFromParent",
            Step::SetOrder { .. } => "setOrder",
            Step::SetProperty { .. } => "setProperty",
            Step::RemoveProperty { .. } => "removeProperty",
            Step::Destroy { .. } => "destroy",
            Step::DestroySubtree { .. } => "destroySubtree",
            Step::Start => "start",
            Step::Sync => "sync",
        }
    }
}

pub fn parse_script(source: &str) -> Result<Vec<Step>> {
    let steps: Vec<Step> = serde_json::from_str(source).context("Invalid replay script")?;
    Ok(steps)
}

type PendingSync = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Applies script steps to a local environment and collects the emitted events
pub struct Replayer {
    local: EntityLocalEnv<Vec<SyncEvent>>,
    aliases: HashMap<String, EntityView>,
    ids: Option<SequentialIds>,
    pending: Vec<PendingSync>,
}

impl Replayer {
    pub fn new(config: &EnvConfig, seed: Option<&str>, start_ready: bool) -> Self {
        let registry = ViewSpaceRegistry::new();
        let local = EntityLocalEnv::from_config(&registry, config, Vec::new());
        if start_ready {
            local.start();
        }

        Self {
            local,
            aliases: HashMap::new(),
            ids: seed.map(SequentialIds::new),
            pending: Vec::new(),
        }
    }

    /// Replayer for `steps`: it starts ready unless the script starts it itself
    pub fn for_script(config: &EnvConfig, seed: Option<&str>, steps: &[Step]) -> Self {
        let start_ready = !steps.iter().any(|step| matches!(step, Step::Start));
        Self::new(config, seed, start_ready)
    }

    fn view(&self, alias: &str) -> Result<&EntityView> {
        self.aliases
            .get(alias)
            .ok_or_else(|| anyhow!("Unknown alias `{}`", alias))
    }

    pub fn step(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Create {
                alias,
                token,
                parent,
                order,
                id,
            } => {
                if self.aliases.contains_key(alias) {
                    bail!("Alias `{}` is already taken", alias);
                }

                let token = token.clone().unwrap_or_else(|| alias.clone());
                let id = id
                    .clone()
                    .map(Into::into)
                    .or_else(|| self.ids.as_mut().map(SequentialIds::next_id));

                let mut builder = EntityView::builder(token).order(*order);
                if let Some(id) = id {
                    builder = builder.id(id);
                }
                if let Some(parent) = parent {
                    builder = builder.parent(self.view(parent)?);
                }
                let view = builder.build(self.local.view_space())?;

                debug!(%alias, id = %view.id(), "created");
                self.aliases.insert(alias.clone(), view);
            }
            Step::SetParent { alias, parent } => {
                let view = self.view(alias)?;
                let parent = parent.as_deref().map(|parent| self.view(parent)).transpose()?;
                view.set_parent(parent)?;
            }
            Step::RemoveFromParent { alias } => self.view(alias)?.remove_from_parent(),
            Step::SetOrder { alias, order } => self.view(alias)?.set_order(*order),
            Step::SetProperty { alias, name, value } => {
                self.view(alias)?.set_property(name, value.clone())
            }
            Step::RemoveProperty { alias, name } => self.view(alias)?.remove_property(name),
            Step::Destroy { alias } => self.view(alias)?.destroy(),
            Step::DestroySubtree { alias } => self.view(alias)?.destroy_subtree(),
            Step::Start => {
                self.local.start();
            }
            Step::Sync => {
                let pending = self.local.sync();
                if !self.local.is_ready() {
                    self.pending.push(Box::pin(pending));
                }
            }
        }
        Ok(())
    }

    /// Events emitted since the last call
    pub fn take_events(&mut self) -> Vec<SyncEvent> {
        std::mem::take(&mut *self.local.consumer())
    }

    /// Start the environment if the script never did and wait for every sync
    pub async fn finish(&mut self) {
        if !self.pending.is_empty() && !self.local.is_ready() {
            warn!(
                pending = self.pending.len(),
                "script ended before start, starting now"
            );
            self.local.start();
        }
        for pending in self.pending.drain(..) {
            pending.await;
        }
    }
}

fn write_event(out: &mut impl Write, event: &SyncEvent, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, event)?;
    } else {
        serde_json::to_writer(&mut *out, event)?;
    }
    writeln!(out)?;
    Ok(())
}

pub async fn replay(args: ReplayArgs, cwd: &str) -> Result<()> {
    let config_dir = args.config.clone().unwrap_or_else(|| PathBuf::from(cwd));
    let config = EnvConfig::load(&config_dir)
        .with_context(|| format!("Failed to load config from {}", config_dir.display()))?;

    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read {}", args.script.display()))?;
    let steps = parse_script(&source)?;

    info!(
        script = %args.script.display(),
        steps = steps.len(),
        namespace = %config.namespace(),
        "replaying"
    );

    let mut replayer = Replayer::for_script(&config, args.seed.as_deref(), &steps);
    let mut emitted = 0;

    for (index, step) in steps.iter().enumerate() {
        replayer
            .step(step)
            .with_context(|| format!("Step {} ({}) failed", index + 1, step.name()))?;

        for event in replayer.take_events() {
            write_event(&mut std::io::stdout().lock(), &event, args.pretty)?;
            emitted += 1;
        }
    }

    replayer.finish().await;
    for event in replayer.take_events() {
        write_event(&mut std::io::stdout().lock(), &event, args.pretty)?;
        emitted += 1;
    }

    info!(events = emitted, "replay finished");
    Ok(())
}
