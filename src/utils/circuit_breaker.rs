use crate::error::{AppError, AppResult};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: RwLock<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: &str, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            inner: RwLock::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            }),
        }
    }

    pub async fn execute<F, T, Fut>(&self, operation: F) -> AppResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = AppResult<T>>,
    {
        self.admit().await?;

        let result = operation().await;
        match &result {
            Ok(_) => self.on_success().await,
            Err(_) => self.on_failure().await,
        }
        result
    }

    /// Rejects the call while open; flips to half-open once the timeout has passed.
    async fn admit(&self) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if inner.state == CircuitState::Open {
            let cooled_down = inner
                .last_failure_time
                .map(|t| t.elapsed() > self.config.timeout)
                .unwrap_or(false);
            if !cooled_down {
                return Err(AppError::provider(format!(
                    "Circuit breaker is open for {}",
                    self.name
                )));
            }
            inner.state = CircuitState::HalfOpen;
            inner.success_count = 0;
            info!("Circuit breaker for {} transitioning to half-open after timeout", self.name);
        }
        Ok(())
    }

    async fn on_success(&self) {
        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failure_count = 0;
                    info!(
                        "Circuit breaker for {} closing after {} successful calls",
                        self.name, inner.success_count
                    );
                }
            }
            CircuitState::Closed | CircuitState::Open => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
            }
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.write().await;
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());

        let should_open = match inner.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => inner.failure_count >= self.config.failure_threshold,
            CircuitState::Open => false,
        };
        if should_open {
            inner.state = CircuitState::Open;
            warn!(
                "Circuit breaker for {} opening after {} failures",
                self.name, inner.failure_count
            );
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    pub async fn get_stats(&self) -> CircuitBreakerStats {
        let inner = self.inner.read().await;
        CircuitBreakerStats {
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            last_failure_time: inner.last_failure_time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub last_failure_time: Option<Instant>,
}

/// One breaker per external service, shared by every client of that service.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_breaker(&self, service_name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(service_name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service_name.to_string())
            .or_insert_with(|| {
                let config = match service_name {
                    "stream_video" => CircuitBreakerConfig {
                        failure_threshold: 5,
                        success_threshold: 2,
                        timeout: Duration::from_secs(30),
                    },
                    _ => CircuitBreakerConfig::default(),
                };
                info!("Created circuit breaker for service: {}", service_name);
                Arc::new(CircuitBreaker::new(service_name, config))
            })
            .clone()
    }

    pub async fn get_all_stats(&self) -> HashMap<String, CircuitBreakerStats> {
        let breakers = self.breakers.read().await;
        let mut stats = HashMap::new();

        for (service_name, breaker) in breakers.iter() {
            stats.insert(service_name.clone(), breaker.get_stats().await);
        }

        stats
    }
}

// Global instance
lazy_static::lazy_static! {
    pub static ref CIRCUIT_BREAKER_REGISTRY: CircuitBreakerRegistry = CircuitBreakerRegistry::new();
}

pub async fn get_circuit_breaker(service_name: &str) -> Arc<CircuitBreaker> {
    CIRCUIT_BREAKER_REGISTRY.get_breaker(service_name).await
}

pub async fn get_all_circuit_breaker_stats() -> HashMap<String, CircuitBreakerStats> {
    CIRCUIT_BREAKER_REGISTRY.get_all_stats().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    fn quick_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 1,
            timeout: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_on_failures() {
        let breaker = CircuitBreaker::new("test", quick_config());

        let result: AppResult<()> = breaker.execute(|| async { Err(AppError::provider("boom")) }).await;
        assert!(result.is_err());
        assert_eq!(breaker.get_state().await, CircuitState::Closed);

        let result: AppResult<()> = breaker.execute(|| async { Err(AppError::provider("boom")) }).await;
        assert!(result.is_err());
        assert_eq!(breaker.get_state().await, CircuitState::Open);

        // Rejected without running the operation
        let result = breaker.execute(|| async { Ok("success") }).await;
        assert!(result.unwrap_err().to_string().contains("Circuit breaker is open"));
    }

    #[tokio::test]
    async fn test_circuit_breaker_half_open_state() {
        let breaker = CircuitBreaker::new("test", quick_config());

        for _ in 0..2 {
            let _: AppResult<()> = breaker.execute(|| async { Err(AppError::provider("boom")) }).await;
        }
        assert_eq!(breaker.get_state().await, CircuitState::Open);

        sleep(Duration::from_millis(60)).await;

        let result = breaker.execute(|| async { Ok("success") }).await;
        assert!(result.is_ok());
        assert_eq!(breaker.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new("test", quick_config());
        for _ in 0..2 {
            let _: AppResult<()> = breaker.execute(|| async { Err(AppError::provider("boom")) }).await;
        }
        sleep(Duration::from_millis(60)).await;

        let _: AppResult<()> = breaker.execute(|| async { Err(AppError::provider("still down")) }).await;
        assert_eq!(breaker.get_state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_registry_shares_breakers_by_name() {
        let registry = CircuitBreakerRegistry::new();
        let a = registry.get_breaker("stream_video").await;
        let b = registry.get_breaker("stream_video").await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.get_all_stats().await.len(), 1);
    }
}
