// A recording `Gateway` for tests.
//
// Everything the core sends is written down so tests can assert on it, and
// reactions can be pushed into live subscriptions with `react`.

use super::{
    Gateway, GatewayError, MemberInfo, MessageHandle, ReactionEvent, ReactionSubscription, Reply,
};
use crate::core::commands::capabilities::CapabilitySet;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

pub const BOT_ID: u64 = 9_000;

pub struct MockGateway {
    next_message_id: AtomicU64,
    pub fail_role_changes: AtomicBool,
    sent: Mutex<Vec<(u64, Reply)>>,
    edits: Mutex<Vec<(MessageHandle, Reply)>>,
    added_reactions: Mutex<Vec<(MessageHandle, String)>>,
    removed_reactions: Mutex<Vec<(MessageHandle, String, u64)>>,
    cleared: Mutex<Vec<MessageHandle>>,
    subscribers: Mutex<HashMap<MessageHandle, mpsc::Sender<ReactionEvent>>>,
    // user -> capabilities held everywhere; (channel, user) overrides
    capabilities: Mutex<HashMap<u64, CapabilitySet>>,
    channel_capabilities: Mutex<HashMap<(u64, u64), CapabilitySet>>,
    members: Mutex<HashMap<(u64, u64), MemberInfo>>,
    role_positions: Mutex<HashMap<u64, i64>>,
    guild_names: Mutex<HashMap<u64, String>>,
    role_log: Mutex<Vec<(&'static str, u64, u64)>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            next_message_id: AtomicU64::new(1),
            fail_role_changes: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            added_reactions: Mutex::new(Vec::new()),
            removed_reactions: Mutex::new(Vec::new()),
            cleared: Mutex::new(Vec::new()),
            subscribers: Mutex::new(HashMap::new()),
            capabilities: Mutex::new(HashMap::new()),
            channel_capabilities: Mutex::new(HashMap::new()),
            members: Mutex::new(HashMap::new()),
            role_positions: Mutex::new(HashMap::new()),
            guild_names: Mutex::new(HashMap::new()),
            role_log: Mutex::new(Vec::new()),
        }
    }

    pub fn grant(&self, user_id: u64, caps: CapabilitySet) {
        self.capabilities.lock().unwrap().insert(user_id, caps);
    }

    pub fn grant_in(&self, channel_id: u64, user_id: u64, caps: CapabilitySet) {
        self.channel_capabilities
            .lock()
            .unwrap()
            .insert((channel_id, user_id), caps);
    }

    pub fn add_member(&self, guild_id: u64, user_id: u64, name: &str, role_ids: Vec<u64>) {
        let member = MemberInfo {
            guild_id,
            user_id,
            display_name: name.to_string(),
            is_bot: user_id == BOT_ID,
            role_ids,
            avatar_url: None,
            joined_at: None,
            account_created: Utc::now(),
        };
        self.members
            .lock()
            .unwrap()
            .insert((guild_id, user_id), member);
    }

    pub fn set_role_position(&self, role_id: u64, position: i64) {
        self.role_positions.lock().unwrap().insert(role_id, position);
    }

    pub fn set_guild_name(&self, guild_id: u64, name: &str) {
        self.guild_names.lock().unwrap().insert(guild_id, name.to_string());
    }

    pub fn member_roles(&self, guild_id: u64, user_id: u64) -> Vec<u64> {
        self.members
            .lock()
            .unwrap()
            .get(&(guild_id, user_id))
            .map(|m| m.role_ids.clone())
            .unwrap_or_default()
    }

    /// ("add" | "remove", user, role) in call order.
    pub fn role_log(&self) -> Vec<(&'static str, u64, u64)> {
        self.role_log.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<(u64, Reply)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_titles(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|(_, reply)| reply.title)
            .collect()
    }

    pub fn edits(&self) -> Vec<(MessageHandle, Reply)> {
        self.edits.lock().unwrap().clone()
    }

    pub fn added_reactions(&self) -> Vec<(MessageHandle, String)> {
        self.added_reactions.lock().unwrap().clone()
    }

    pub fn removed_reactions(&self) -> Vec<(MessageHandle, String, u64)> {
        self.removed_reactions.lock().unwrap().clone()
    }

    pub fn cleared(&self) -> Vec<MessageHandle> {
        self.cleared.lock().unwrap().clone()
    }

    /// Whether somebody still holds the subscription for `handle`.
    pub fn is_subscribed(&self, handle: MessageHandle) -> bool {
        self.subscribers
            .lock()
            .unwrap()
            .get(&handle)
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Deliver a reaction to the subscription on `handle`, if any.
    pub async fn react(&self, handle: MessageHandle, user_id: u64, glyph: &str) {
        let sender = self.subscribers.lock().unwrap().get(&handle).cloned();
        if let Some(sender) = sender {
            let _ = sender
                .send(ReactionEvent {
                    message: handle,
                    user_id,
                    glyph: glyph.to_string(),
                })
                .await;
        }
    }

    fn record_role(&self, op: &'static str, guild_id: u64, user_id: u64, role_id: u64) {
        self.role_log.lock().unwrap().push((op, user_id, role_id));
        let mut members = self.members.lock().unwrap();
        if let Some(member) = members.get_mut(&(guild_id, user_id)) {
            if op == "add" {
                if !member.role_ids.contains(&role_id) {
                    member.role_ids.push(role_id);
                }
            } else {
                member.role_ids.retain(|r| *r != role_id);
            }
        }
    }
}

#[async_trait]
impl Gateway for MockGateway {
    fn bot_user_id(&self) -> u64 {
        BOT_ID
    }

    fn bot_name(&self) -> String {
        "TestBot".to_string()
    }

    async fn send(&self, channel_id: u64, reply: Reply) -> Result<MessageHandle, GatewayError> {
        self.sent.lock().unwrap().push((channel_id, reply));
        Ok(MessageHandle {
            channel_id,
            message_id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn edit(&self, handle: MessageHandle, reply: Reply) -> Result<(), GatewayError> {
        self.edits.lock().unwrap().push((handle, reply));
        Ok(())
    }

    async fn add_reaction(&self, handle: MessageHandle, glyph: &str) -> Result<(), GatewayError> {
        self.added_reactions
            .lock()
            .unwrap()
            .push((handle, glyph.to_string()));
        Ok(())
    }

    async fn remove_reaction(
        &self,
        handle: MessageHandle,
        glyph: &str,
        user_id: u64,
    ) -> Result<(), GatewayError> {
        self.removed_reactions
            .lock()
            .unwrap()
            .push((handle, glyph.to_string(), user_id));
        Ok(())
    }

    async fn clear_reactions(&self, handle: MessageHandle) -> Result<(), GatewayError> {
        self.cleared.lock().unwrap().push(handle);
        Ok(())
    }

    fn subscribe_reactions(&self, handle: MessageHandle) -> ReactionSubscription {
        let (tx, rx) = mpsc::channel(32);
        self.subscribers.lock().unwrap().insert(handle, tx);
        ReactionSubscription::new(rx)
    }

    fn capabilities(&self, _guild_id: u64, channel_id: u64, user_id: u64) -> CapabilitySet {
        if let Some(caps) = self
            .channel_capabilities
            .lock()
            .unwrap()
            .get(&(channel_id, user_id))
        {
            return caps.clone();
        }
        self.capabilities
            .lock()
            .unwrap()
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn member(&self, guild_id: u64, user_id: u64) -> Result<Option<MemberInfo>, GatewayError> {
        Ok(self.members.lock().unwrap().get(&(guild_id, user_id)).cloned())
    }

    fn highest_role_position(&self, guild_id: u64, user_id: u64) -> i64 {
        let roles = self.member_roles(guild_id, user_id);
        let positions = self.role_positions.lock().unwrap();
        roles
            .iter()
            .filter_map(|r| positions.get(r).copied())
            .max()
            .unwrap_or(0)
    }

    fn role_position(&self, _guild_id: u64, role_id: u64) -> Option<i64> {
        self.role_positions.lock().unwrap().get(&role_id).copied()
    }

    fn guild_name(&self, guild_id: u64) -> Option<String> {
        self.guild_names.lock().unwrap().get(&guild_id).cloned()
    }

    async fn add_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        _reason: &str,
    ) -> Result<(), GatewayError> {
        if self.fail_role_changes.load(Ordering::SeqCst) {
            return Err(GatewayError::MissingAccess("Missing Permissions".to_string()));
        }
        self.record_role("add", guild_id, user_id, role_id);
        Ok(())
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        user_id: u64,
        role_id: u64,
        _reason: &str,
    ) -> Result<(), GatewayError> {
        if self.fail_role_changes.load(Ordering::SeqCst) {
            return Err(GatewayError::MissingAccess("Missing Permissions".to_string()));
        }
        self.record_role("remove", guild_id, user_id, role_id);
        Ok(())
    }
}
