//! Цепочки запасных стратегий: упорядоченный список бэкендов, которые
//! пробуются по очереди до первого успеха.

use crate::error::{AhkError, Result};
use tracing::{debug, warn};

/// Один способ выполнить действие (wpctl, pactl, медиаклавиша и т.п.)
pub trait Strategy<I: ?Sized>: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, input: &I) -> Result<()>;
}

pub struct FallbackChain<I: ?Sized> {
    label: &'static str,
    strategies: Vec<Box<dyn Strategy<I>>>,
}

impl<I: ?Sized> FallbackChain<I> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            strategies: Vec::new(),
        }
    }

    pub fn with(mut self, strategy: impl Strategy<I> + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|strategy| strategy.name()).collect()
    }

    /// Возвращает имя сработавшей стратегии
    pub fn run(&self, input: &I) -> Result<&'static str> {
        for (position, strategy) in self.strategies.iter().enumerate() {
            match strategy.attempt(input) {
                Ok(()) => {
                    if position > 0 {
                        debug!("{}: сработал запасной вариант '{}'", self.label, strategy.name());
                    }
                    return Ok(strategy.name());
                }
                Err(e) => {
                    debug!("{}: '{}' не сработал: {}", self.label, strategy.name(), e);
                }
            }
        }

        warn!("{}: ни одна из {} стратегий не сработала", self.label, self.strategies.len());
        Err(AhkError::FallbackExhausted(self.label.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Scripted {
        name: &'static str,
        succeed: bool,
        log: Arc<Mutex<Vec<(&'static str, i32)>>>,
    }

    impl Strategy<i32> for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn attempt(&self, input: &i32) -> Result<()> {
            self.log.lock().push((self.name, *input));
            if self.succeed {
                Ok(())
            } else {
                Err(AhkError::tool(self.name, "exit status 1"))
            }
        }
    }

    fn chain(plan: &[(&'static str, bool)]) -> (FallbackChain<i32>, Arc<Mutex<Vec<(&'static str, i32)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = plan.iter().fold(FallbackChain::new("volume"), |chain, (name, succeed)| {
            chain.with(Scripted {
                name: *name,
                succeed: *succeed,
                log: log.clone(),
            })
        });
        (chain, log)
    }

    #[test]
    fn test_first_success_wins() {
        let (chain, log) = chain(&[("wpctl", true), ("pactl", true)]);
        assert_eq!(chain.run(&5).unwrap(), "wpctl");
        assert_eq!(*log.lock(), vec![("wpctl", 5)]);
    }

    #[test]
    fn test_falls_through_in_order() {
        let (chain, log) = chain(&[("wpctl", false), ("pactl", false), ("media_key", true)]);
        assert_eq!(chain.names(), vec!["wpctl", "pactl", "media_key"]);
        assert_eq!(chain.run(&-2).unwrap(), "media_key");
        let attempted: Vec<_> = log.lock().iter().map(|(name, _)| *name).collect();
        assert_eq!(attempted, vec!["wpctl", "pactl", "media_key"]);
    }

    #[test]
    fn test_exhausted_chain_reports_label() {
        let (chain, _) = chain(&[("wpctl", false), ("pactl", false)]);
        match chain.run(&1) {
            Err(AhkError::FallbackExhausted(label)) => assert_eq!(label, "volume"),
            other => panic!("unexpected result: {:?}", other),
        }

        let empty: FallbackChain<i32> = FallbackChain::new("desktop");
        assert!(matches!(empty.run(&0), Err(AhkError::FallbackExhausted(_))));
    }
}
