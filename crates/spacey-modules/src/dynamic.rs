// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dynamic import gateway
//!
//! `import()` never completes synchronously. Concurrent imports of one
//! module share a single pipeline run; imports of a module that has already
//! settled wait one scheduler turn and then reuse the cached outcome.

use crate::engine::ModuleEngine;
use crate::error::{ModuleError, Result};
use crate::graph::GraphBuilder;
use crate::linker::Linker;
use crate::namespace::Namespace;
use crate::resolver::ResolvedModule;
use crate::specifier::ModuleId;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;

type PendingImport = Shared<BoxFuture<'static, Result<()>>>;

/// Pipeline runs currently in flight, by module
#[derive(Default)]
pub(crate) struct DynamicImports {
    in_flight: Mutex<HashMap<ModuleId, PendingImport>>,
}

impl DynamicImports {
    pub(crate) fn len(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn finish(&self, id: &ModuleId) {
        self.in_flight.lock().remove(id);
    }
}

impl ModuleEngine {
    /// Asynchronously load, link and evaluate a module and return its
    /// namespace
    ///
    /// Must be awaited on a tokio runtime. Resolution, linking and
    /// evaluation failures all surface as the returned error.
    pub async fn import_dynamic(
        &self,
        specifier: &str,
        referrer: Option<&ModuleId>,
    ) -> Result<Namespace> {
        let resolved = self.resolve(specifier, referrer)?;

        match self.join_or_start(&resolved) {
            Some(pending) => pending.await?,
            None => tokio::task::yield_now().await,
        }

        let record = self
            .store()
            .get(&resolved.id)
            .ok_or_else(|| ModuleError::Detached(resolved.id.clone()))?;
        if let Some(err) = record.error() {
            return Err(err);
        }
        self.store().namespace(&resolved.id, referrer)
    }

    /// Number of dynamic imports still running
    pub fn pending_imports(&self) -> usize {
        self.dynamic().len()
    }

    fn join_or_start(&self, resolved: &ResolvedModule) -> Option<PendingImport> {
        let mut in_flight = self.dynamic().in_flight.lock();
        if let Some(pending) = in_flight.get(&resolved.id) {
            tracing::trace!("Joining in-flight import of {}", resolved.id);
            return Some(pending.clone());
        }

        let record = self.store().get_or_create(&resolved.id, resolved.format);
        if record.status().is_settled() {
            return None;
        }

        let pending = self.spawn_pipeline(resolved.id.clone());
        in_flight.insert(resolved.id.clone(), pending.clone());
        Some(pending)
    }

    fn spawn_pipeline(&self, id: ModuleId) -> PendingImport {
        let engine = self.clone();
        let task = tokio::spawn(async move {
            let result = engine.run_pipeline(&id).await;
            engine.dynamic().finish(&id);
            result
        });

        async move {
            task.await
                .map_err(|e| ModuleError::Aborted(e.to_string()))?
        }
        .boxed()
        .shared()
    }

    async fn run_pipeline(&self, id: &ModuleId) -> Result<()> {
        GraphBuilder::new(self).prefetch(id).await?;

        let engine = self.clone();
        let id = id.clone();
        tokio::task::spawn_blocking(move || Linker::new(&engine).run(&id))
            .await
            .map_err(|e| ModuleError::Aborted(e.to_string()))?
    }
}
