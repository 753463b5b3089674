//! Разбор жестов: поток press/release по имени действия превращается ровно
//! в одно из событий {Fire, Tap, HoldStart, HoldTick, HoldEnd}.
//!
//! Для каждого действия хранится не более одного [`GestureState`]: повторный
//! press при активном жесте ничего не делает, так гасится автоповтор ОС.
//! Разные действия независимы и могут обрабатываться параллельно.

use crate::debug_if_enabled;
use crate::services::repeat_scheduler::{RepeatHandle, RepeatScheduler, RepeatTiming};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Как действие реагирует на нажатие
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureKind {
    /// Одно срабатывание на физическое нажатие
    Single,
    /// Срабатывание сразу и повторы, пока клавиша удерживается
    Repeat(RepeatTiming),
    /// Короткое нажатие или удержание дольше порога
    TapHold { threshold: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureEvent {
    Fire,
    Tap,
    HoldStart,
    HoldTick,
    HoldEnd,
}

/// Получатель событий жестов
pub trait GestureSink: Send + Sync + 'static {
    fn on_gesture(&self, action: &str, event: GestureEvent);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pressed,
    Held,
}

#[derive(Debug)]
struct GestureState {
    generation: u64,
    kind: GestureKind,
    started: Instant,
    /// Последнее нажатие (включая автоповтор), пришедшее в этот жест
    last_seen: Instant,
    phase: Phase,
    timer: Option<RepeatHandle>,
}

struct TrackerInner {
    kinds: DashMap<String, GestureKind>,
    gestures: DashMap<String, GestureState>,
    generation: AtomicU64,
    scheduler: RepeatScheduler,
    sink: Arc<dyn GestureSink>,
    max_hold: Option<Duration>,
}

#[derive(Clone)]
pub struct GestureTracker {
    inner: Arc<TrackerInner>,
}

impl GestureTracker {
    pub fn new(
        scheduler: RepeatScheduler,
        sink: Arc<dyn GestureSink>,
        max_hold: Option<Duration>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                kinds: DashMap::new(),
                gestures: DashMap::new(),
                generation: AtomicU64::new(0),
                scheduler,
                sink,
                max_hold,
            }),
        }
    }

    pub fn register(&self, action: &str, kind: GestureKind) {
        debug!("Регистрация действия '{}' как {:?}", action, kind);
        self.inner.kinds.insert(action.to_string(), kind);
    }

    #[cfg(test)]
    pub fn is_active(&self, action: &str) -> bool {
        self.inner.gestures.contains_key(action)
    }

    pub fn active_count(&self) -> usize {
        self.inner.gestures.len()
    }

    /// Нажатие (в том числе автоповтор ОС)
    pub fn press(&self, action: &str) {
        let Some(kind) = self.inner.kinds.get(action).map(|kind| *kind) else {
            debug_if_enabled!("Действие '{}' не зарегистрировано, нажатие пропущено", action);
            return;
        };

        let now = Instant::now();
        let generation = match self.inner.gestures.entry(action.to_string()) {
            Entry::Occupied(mut entry) => {
                if !self.is_stale(entry.get(), now) {
                    entry.get_mut().last_seen = now;
                    debug_if_enabled!("Жест '{}' уже активен, повторное нажатие поглощено", action);
                    return;
                }
                let stale = entry.remove();
                warn!(
                    "Жест '{}' молчал {:?} без отпускания, сбрасываем",
                    action,
                    now.duration_since(stale.last_seen)
                );
                self.finish(action, stale, false);
                // Дальше обрабатываем как свежее нажатие
                match self.inner.gestures.entry(action.to_string()) {
                    Entry::Occupied(_) => return,
                    Entry::Vacant(entry) => self.insert_state(entry, kind, now),
                }
            }
            Entry::Vacant(entry) => self.insert_state(entry, kind, now),
        };

        debug!("Жест '{}' начат ({:?})", action, kind);

        match kind {
            GestureKind::Single => self.inner.sink.on_gesture(action, GestureEvent::Fire),
            GestureKind::Repeat(timing) => {
                let sink = Arc::clone(&self.inner.sink);
                let name = action.to_string();
                let first = AtomicBool::new(true);
                let handle = self.inner.scheduler.start_repeating(action, timing, move || {
                    let event = if first.swap(false, Ordering::SeqCst) {
                        GestureEvent::Fire
                    } else {
                        GestureEvent::HoldTick
                    };
                    sink.on_gesture(&name, event);
                });
                self.attach_timer(action, generation, handle);
            }
            GestureKind::TapHold { threshold } => {
                let inner = Arc::clone(&self.inner);
                let name = action.to_string();
                let handle = self.inner.scheduler.schedule_once(action, threshold, move || {
                    let became_hold = match inner.gestures.get_mut(&name) {
                        Some(mut state)
                            if state.generation == generation && state.phase == Phase::Pressed =>
                        {
                            state.phase = Phase::Held;
                            true
                        }
                        _ => false,
                    };
                    if became_hold {
                        debug!("Жест '{}' классифицирован как удержание", name);
                        inner.sink.on_gesture(&name, GestureEvent::HoldStart);
                    }
                });
                self.attach_timer(action, generation, handle);
            }
        }
    }

    /// Отпускание: останавливает таймер и завершает жест
    pub fn release(&self, action: &str) {
        let Some((_, state)) = self.inner.gestures.remove(action) else {
            debug_if_enabled!("Отпускание '{}' без активного жеста", action);
            return;
        };
        debug!("Жест '{}' завершён через {:?}", action, state.started.elapsed());
        self.finish(action, state, true);
    }

    /// Останавливает все живые жесты без событий (завершение работы)
    pub fn clear(&self) {
        let actions: Vec<String> = self
            .inner
            .gestures
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        if !actions.is_empty() {
            debug!("Остановка {} активных жестов", actions.len());
        }

        for action in actions {
            if let Some((_, state)) = self.inner.gestures.remove(&action) {
                if let Some(timer) = state.timer {
                    self.inner.scheduler.stop(timer);
                }
            }
        }
    }

    fn insert_state(
        &self,
        entry: dashmap::mapref::entry::VacantEntry<'_, String, GestureState>,
        kind: GestureKind,
        now: Instant,
    ) -> u64 {
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        entry.insert(GestureState {
            generation,
            kind,
            started: now,
            last_seen: now,
            phase: Phase::Pressed,
            timer: None,
        });
        generation
    }

    /// Залипшим считается жест, для которого дольше `max_hold` не было ни одного
    /// нажатия: удерживаемая клавиша сама обновляет `last_seen` автоповтором
    fn is_stale(&self, state: &GestureState, now: Instant) -> bool {
        self.inner
            .max_hold
            .is_some_and(|max_hold| now.duration_since(state.last_seen) >= max_hold)
    }

    /// Привязывает таймер к жесту; если жест уже отпущен, таймер сразу останавливается
    fn attach_timer(&self, action: &str, generation: u64, handle: RepeatHandle) {
        let orphan = match self.inner.gestures.get_mut(action) {
            Some(mut state) if state.generation == generation => {
                state.timer = Some(handle);
                None
            }
            _ => Some(handle),
        };
        if let Some(handle) = orphan {
            self.inner.scheduler.stop(handle);
        }
    }

    /// Общий хвост для release и сброса залипшего жеста.
    /// `released` = false означает принудительный сброс: Tap в этом случае не генерируется.
    fn finish(&self, action: &str, state: GestureState, released: bool) {
        if let Some(timer) = state.timer {
            self.inner.scheduler.stop(timer);
        }

        let event = match (state.kind, state.phase) {
            (GestureKind::Single, _) => None,
            (GestureKind::Repeat(_), _) => Some(GestureEvent::HoldEnd),
            (GestureKind::TapHold { .. }, Phase::Held) => Some(GestureEvent::HoldEnd),
            (GestureKind::TapHold { .. }, Phase::Pressed) if released => Some(GestureEvent::Tap),
            (GestureKind::TapHold { .. }, Phase::Pressed) => None,
        };

        if let Some(event) = event {
            self.inner.sink.on_gesture(action, event);
        }
    }
}
