//! Shared fakes for engine tests

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tnuke::{ResourceNuker, ResourceValue, Scope};

/// In-memory resource type recording every call made to it
#[derive(Default)]
pub struct FakeNuker {
    pub name: String,
    pub batch_size: usize,
    pub global: bool,
    pub values: Vec<ResourceValue>,
    /// Returned by every listing after the first, when set
    pub later_values: Option<Vec<ResourceValue>>,
    pub fail: HashSet<String>,
    pub list_error: Option<String>,
    pub delay: Option<Duration>,
    pub list_calls: Mutex<Vec<Scope>>,
    pub delete_calls: Mutex<Vec<(Scope, String)>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeNuker {
    pub fn new(name: &str, batch_size: usize) -> Self {
        Self {
            name: name.to_string(),
            batch_size,
            ..Default::default()
        }
    }

    pub fn with_values(mut self, values: Vec<ResourceValue>) -> Self {
        self.values = values;
        self
    }

    pub fn with_names(self, names: &[&str]) -> Self {
        let values = names.iter().map(|n| ResourceValue::new(*n)).collect();
        self.with_values(values)
    }

    /// Later listings return `names` instead, like resources appearing mid-run
    pub fn then_list(mut self, names: &[&str]) -> Self {
        self.later_values = Some(names.iter().map(|n| ResourceValue::new(*n)).collect());
        self
    }

    pub fn failing(mut self, names: &[&str]) -> Self {
        self.fail = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_list_error(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn deleted(&self) -> Vec<String> {
        self.delete_calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn deleted_in(&self, scope: &str) -> Vec<String> {
        self.delete_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s.as_str() == scope)
            .map(|(_, id)| id.clone())
            .collect()
    }

    pub fn list_count(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ResourceNuker for FakeNuker {
    fn resource_type_name(&self) -> &str {
        &self.name
    }

    fn max_batch_size(&self) -> usize {
        self.batch_size
    }

    fn is_global(&self) -> bool {
        self.global
    }

    async fn list(&self, scope: &Scope) -> anyhow::Result<Vec<ResourceValue>> {
        let first = {
            let mut calls = self.list_calls.lock().unwrap();
            calls.push(scope.clone());
            calls.len() == 1
        };
        match (&self.list_error, &self.later_values) {
            (Some(message), _) => Err(anyhow!(message.clone())),
            (None, Some(later)) if !first => Ok(later.clone()),
            (None, _) => Ok(self.values.clone()),
        }
    }

    async fn delete_one(&self, scope: &Scope, identifier: &str) -> anyhow::Result<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.delete_calls
            .lock()
            .unwrap()
            .push((scope.clone(), identifier.to_string()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail.contains(identifier) {
            Err(anyhow!("simulated failure"))
        } else {
            Ok(())
        }
    }
}

pub fn ids(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("id-{i}")).collect()
}
