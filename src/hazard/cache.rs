use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::hazard::RiskAssessment;

#[derive(Debug, Clone)]
pub struct CachedAssessment {
    pub captured_at: DateTime<Utc>,
    pub assessment: RiskAssessment,
}

/// Time-bounded cache of live assessments, owned by one assessor.
#[derive(Debug)]
pub struct AssessmentCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedAssessment>>,
}

impl AssessmentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    pub fn put(&self, assessment: RiskAssessment) {
        if !self.is_enabled() {
            return;
        }
        let key = cache_key(&assessment.location);
        let value = CachedAssessment {
            captured_at: Utc::now(),
            assessment,
        };
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(key, value);
    }

    pub fn get(&self, location: &str) -> Option<RiskAssessment> {
        if !self.is_enabled() {
            return None;
        }
        let ttl = chrono::Duration::from_std(self.ttl).ok()?;
        let mut guard = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let key = cache_key(location);
        match guard.get(&key) {
            Some(cached) if Utc::now() - cached.captured_at < ttl => {
                let mut assessment = cached.assessment.clone();
                assessment.location = location.to_string();
                Some(assessment)
            }
            Some(_) => {
                guard.remove(&key);
                None
            }
            None => None,
        }
    }
}

fn cache_key(location: &str) -> String {
    location.trim().to_ascii_lowercase()
}
