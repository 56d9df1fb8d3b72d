use std::{collections::HashMap, sync::Arc};

use msrpc_dtyp::Guid;

use crate::{RpcError, pdu::DceRpcSyntaxId};

use super::ServerHandle;

/// Interfaces served by a server, by abstract syntax.
#[derive(Default, Clone)]
pub struct ServerRegistry {
    servers: HashMap<(Guid, u16), Arc<dyn ServerHandle>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: Arc<dyn ServerHandle>) -> crate::Result<()> {
        let syntax = handle.syntax_id();
        let key = (syntax.uuid, syntax.major());
        if self.servers.contains_key(&key) {
            return Err(RpcError::DuplicateInterface(syntax));
        }
        log::debug!("Registered interface {} {syntax}", handle.name());
        self.servers.insert(key, handle);
        Ok(())
    }

    /// Finds the server for a requested abstract syntax.
    ///
    /// Major versions must match; the server's minor version must be at least the requested one.
    pub fn lookup(&self, syntax: &DceRpcSyntaxId) -> Option<Arc<dyn ServerHandle>> {
        self.servers
            .get(&(syntax.uuid, syntax.major()))
            .filter(|handle| handle.syntax_id().minor() >= syntax.minor())
            .cloned()
    }

    pub fn handles(&self) -> impl Iterator<Item = &Arc<dyn ServerHandle>> {
        self.servers.values()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
