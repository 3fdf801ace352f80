//! Scenario files and step execution

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::task::JoinHandle;

use mailbox::{
    EngineConfig, Folder, InMemoryTransport, InputEvent, ItemId, Key, KeyChord, MailboxView,
    ScrollMetrics, SelectMode, Session, ThreadSummary,
};

/// A mailbox plus a script of user input
#[derive(Debug, Deserialize)]
pub struct Scenario {
    pub user_id: String,
    /// Connection handle; omit to replay a signed-out session
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub config: Option<EngineConfig>,
    #[serde(default)]
    pub items: Vec<ThreadSummary>,
    /// Ids whose remote updates are rejected
    #[serde(default)]
    pub fail_ids: Vec<String>,
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn session(&self) -> Session {
        match &self.connection_id {
            Some(connection_id) => Session::new(self.user_id.clone(), connection_id.clone()),
            None => Session::disconnected(self.user_id.clone()),
        }
    }

    pub fn transport(&self) -> InMemoryTransport {
        let transport = InMemoryTransport::with_items(self.items.iter().cloned());
        for id in &self.fail_ids {
            transport.fail_for(id);
        }
        transport
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Open a folder by route name
    Open(String),
    Refresh,
    /// Press a chord such as `Control` or `Meta+Shift+u`
    KeyDown(String),
    KeyUp(String),
    Blur,
    SetMode(SelectMode),
    Activate(String),
    SelectAll,
    Archive,
    MarkSpam,
    MoveToInbox,
    MarkRead,
    MarkUnread,
    Scroll(ScrollMetrics),
    /// Make every remote write fail (or succeed again)
    FailAll(bool),
}

/// Runs steps against one view and keeps background mark-read calls
pub struct Runner {
    pub view: MailboxView,
    pub transport: Arc<InMemoryTransport>,
    background: Vec<JoinHandle<bool>>,
}

impl Runner {
    pub fn new(view: MailboxView, transport: Arc<InMemoryTransport>) -> Self {
        Self {
            view,
            transport,
            background: Vec::new(),
        }
    }

    pub async fn run(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Open(name) => {
                let folder = Folder::from_name(name);
                match self.view.open_folder(folder).await {
                    Ok(loaded) => info!("Opened {} ({} items loaded)", name, loaded),
                    Err(e) => warn!("Failed to open {}: {}", name, e),
                }
            }
            Step::Refresh => {
                if let Err(e) = self.view.refresh().await {
                    warn!("Refresh failed: {}", e);
                }
            }
            Step::KeyDown(chord) => {
                let chord: KeyChord = chord
                    .parse()
                    .with_context(|| format!("Bad chord in scenario: {}", chord))?;
                self.view.handle_input(&InputEvent::KeyDown(chord)).await;
            }
            Step::KeyUp(key) => {
                self.view
                    .handle_input(&InputEvent::KeyUp(Key::parse(key)))
                    .await;
            }
            Step::Blur => {
                self.view.handle_input(&InputEvent::Blur).await;
            }
            Step::SetMode(mode) => self.view.set_mode(*mode),
            Step::Activate(id) => {
                let activated = self.view.activate(&ItemId::new(id.as_str()));
                info!("Activated {}: {:?}", id, activated.activation);
                if let Some(mark_read) = activated.mark_read {
                    self.background.push(tokio::spawn(mark_read));
                }
            }
            Step::SelectAll => {
                self.view.select_all();
            }
            Step::Archive => {
                let _ = self.view.archive_selected().await;
            }
            Step::MarkSpam => {
                let _ = self.view.mark_spam_selected().await;
            }
            Step::MoveToInbox => {
                let _ = self.view.move_to_inbox_selected().await;
            }
            Step::MarkRead => {
                let _ = self.view.mark_read_selected().await;
            }
            Step::MarkUnread => {
                let _ = self.view.mark_unread_selected().await;
            }
            Step::Scroll(metrics) => match self.view.on_scroll(*metrics).await {
                Ok(added) if added > 0 => info!("Loaded {} more items", added),
                Ok(_) => {}
                Err(e) => warn!("{}", e),
            },
            Step::FailAll(fail) => self.transport.set_fail_all(*fail),
        }
        Ok(())
    }

    /// Wait for background mark-read calls. Returns how many failed.
    pub async fn settle(&mut self) -> Result<usize> {
        let mut failed = 0;
        for handle in self.background.drain(..) {
            if !handle.await.context("Mark-read task panicked")? {
                failed += 1;
            }
        }
        Ok(failed)
    }
}

/// Engine config precedence: explicit file, then the scenario, then defaults
pub fn engine_config(explicit: Option<&std::path::Path>, scenario: Option<&EngineConfig>) -> Result<EngineConfig> {
    match (explicit, scenario) {
        (Some(path), _) => EngineConfig::from_file(path),
        (None, Some(config)) => Ok(config.clone()),
        (None, None) => EngineConfig::load(),
    }
}
