//! 登录失败节流
//! Login failure throttling

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// 触发锁定的失败次数
pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// 锁定时长（15 分钟）
pub const LOCKOUT_SECS: u64 = 900;

#[derive(Debug, Clone, Copy)]
struct Attempts {
    count: u32,
    lockout_until: Option<Instant>,
}

/// 按用户名统计登录失败次数
pub struct LoginThrottle {
    attempts: Mutex<HashMap<String, Attempts>>,
    max_attempts: u32,
    lockout: Duration,
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new(MAX_LOGIN_ATTEMPTS, Duration::from_secs(LOCKOUT_SECS))
    }
}

impl LoginThrottle {
    pub fn new(max_attempts: u32, lockout: Duration) -> Self {
        Self {
            attempts: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
            lockout,
        }
    }

    pub fn is_locked_out(&self, username: &str) -> bool {
        self.is_locked_out_at(username, Instant::now())
    }

    /// 锁定到期后清除计数
    pub fn is_locked_out_at(&self, username: &str, now: Instant) -> bool {
        let mut attempts = self.attempts.lock();
        let Some(entry) = attempts.get(username).copied() else {
            return false;
        };
        if entry.count < self.max_attempts {
            return false;
        }
        match entry.lockout_until {
            Some(until) if now < until => true,
            _ => {
                attempts.remove(username);
                false
            }
        }
    }

    pub fn record_failure(&self, username: &str) {
        self.record_failure_at(username, Instant::now());
    }

    pub fn record_failure_at(&self, username: &str, now: Instant) {
        let mut attempts = self.attempts.lock();
        let entry = attempts.entry(username.to_string()).or_insert(Attempts {
            count: 0,
            lockout_until: None,
        });
        entry.count += 1;
        if entry.count >= self.max_attempts {
            entry.lockout_until = Some(now + self.lockout);
            tracing::warn!(username, attempts = entry.count, "登录失败次数过多，已锁定");
        }
    }

    pub fn clear(&self, username: &str) {
        self.attempts.lock().remove(username);
    }

    pub fn failures(&self, username: &str) -> u32 {
        self.attempts
            .lock()
            .get(username)
            .map(|a| a.count)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lockout_after_five_failures() {
        let throttle = LoginThrottle::default();
        let now = Instant::now();
        for _ in 0..4 {
            throttle.record_failure_at("ana", now);
        }
        assert!(!throttle.is_locked_out_at("ana", now));
        throttle.record_failure_at("ana", now);
        assert!(throttle.is_locked_out_at("ana", now));
        assert!(throttle.is_locked_out_at("ana", now + Duration::from_secs(899)));
        assert!(!throttle.is_locked_out_at("beto", now));
    }

    #[test]
    fn test_lockout_expires_and_resets() {
        let throttle = LoginThrottle::default();
        let now = Instant::now();
        for _ in 0..5 {
            throttle.record_failure_at("ana", now);
        }
        let after = now + Duration::from_secs(LOCKOUT_SECS + 1);
        assert!(!throttle.is_locked_out_at("ana", after));
        assert_eq!(throttle.failures("ana"), 0);
    }

    #[test]
    fn test_clear() {
        let throttle = LoginThrottle::default();
        throttle.record_failure("ana");
        throttle.clear("ana");
        assert_eq!(throttle.failures("ana"), 0);
    }
}
