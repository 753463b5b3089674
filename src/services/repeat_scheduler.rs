//! Планировщик повторов для удерживаемых действий.
//!
//! Один тип задачи на все случаи: шаг вызывается сразу, затем после
//! начальной задержки и далее с постоянным интервалом, пока владелец
//! (состояние жеста) не вызовет [`RepeatScheduler::stop`]. Остановка
//! синхронная: после возврата из `stop` ни один новый тик не начнётся,
//! а тик, уже выполнявшийся в момент остановки, успевает завершиться
//! (ожидание ограничено [`STOP_WAIT_TIMEOUT`]).
//!
//! Шаги вызывают внешние утилиты и uinput, поэтому тики выполняются в
//! пуле блокирующих потоков и не занимают воркеры рантайма.

use crate::debug_if_enabled;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Сколько `stop` ждёт завершения тика, который уже выполняется
pub const STOP_WAIT_TIMEOUT: Duration = Duration::from_millis(300);

/// Тайминги повтора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatTiming {
    pub initial: Duration,
    pub interval: Duration,
}

impl RepeatTiming {
    pub fn new(initial: Duration, interval: Duration) -> Self {
        Self { initial, interval }
    }

    pub fn from_millis(initial_ms: u64, interval_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(initial_ms),
            Duration::from_millis(interval_ms),
        )
    }
}

impl From<crate::config::RepeatTimingConfig> for RepeatTiming {
    fn from(config: crate::config::RepeatTimingConfig) -> Self {
        Self::new(config.initial_delay(), config.interval())
    }
}

/// Дескриптор живого повтора; уничтожается только через [`RepeatScheduler::stop`]
#[derive(Debug)]
pub struct RepeatHandle {
    id: String,
    token: CancellationToken,
    // Тик выполняется под этим замком, stop() его дожидается
    gate: Arc<Mutex<()>>,
    task: JoinHandle<()>,
}

#[derive(Clone)]
pub struct RepeatScheduler {
    runtime: Handle,
}

impl RepeatScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Вызывает `step` синхронно, затем через `timing.initial` и далее каждые
    /// `timing.interval` до остановки
    pub fn start_repeating<F>(&self, id: &str, timing: RepeatTiming, step: F) -> RepeatHandle
    where
        F: Fn() + Send + Sync + 'static,
    {
        step();

        let step = Arc::new(step);
        let token = CancellationToken::new();
        let gate = Arc::new(Mutex::new(()));
        let cancel = token.clone();
        let task_gate = Arc::clone(&gate);
        let task_id = id.to_string();

        let task = self.runtime.spawn(async move {
            trace!(
                id = %task_id,
                initial_ms = timing.initial.as_millis() as u64,
                interval_ms = timing.interval.as_millis() as u64,
                "Запуск повтора"
            );

            tokio::select! {
                _ = time::sleep(timing.initial) => {}
                _ = cancel.cancelled() => {
                    trace!(id = %task_id, "Повтор отменён до первого тика");
                    return;
                }
            }

            // Первый тик interval срабатывает сразу: это и есть тик после начальной задержки
            let mut ticker = time::interval(timing.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut ticks: u64 = 0;
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let step = Arc::clone(&step);
                        if run_blocking(&task_id, &task_gate, &cancel, move || step()).await.is_none() {
                            break;
                        }
                        ticks += 1;
                    }
                }
            }

            debug_if_enabled!("Повтор {} завершён после {} тиков", task_id, ticks);
        });

        RepeatHandle {
            id: id.to_string(),
            token,
            gate,
            task,
        }
    }

    /// Однократный отложенный вызов (порог удержания для tap/hold)
    pub fn schedule_once<F>(&self, id: &str, delay: Duration, action: F) -> RepeatHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let token = CancellationToken::new();
        let gate = Arc::new(Mutex::new(()));
        let cancel = token.clone();
        let task_gate = Arc::clone(&gate);
        let task_id = id.to_string();

        let task = self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!(id = %task_id, "Отложенный вызов отменён");
                }
                _ = time::sleep(delay) => {
                    run_blocking(&task_id, &task_gate, &cancel, action).await;
                }
            }
        });

        RepeatHandle {
            id: id.to_string(),
            token,
            gate,
            task,
        }
    }

    /// Отменяет повтор и дожидается завершения тика, если он сейчас выполняется.
    /// Нельзя вызывать из самого шага этого же повтора.
    pub fn stop(&self, handle: RepeatHandle) {
        handle.token.cancel();
        // Новый тик проверяет отмену под замком, поэтому после захвата он уже не начнётся
        match handle.gate.try_lock_for(STOP_WAIT_TIMEOUT) {
            Some(guard) => drop(guard),
            None => warn!(
                "Тик повтора {} не завершился за {:?}, продолжаем без ожидания",
                handle.id, STOP_WAIT_TIMEOUT
            ),
        }
        trace!(id = %handle.id, finished = handle.task.is_finished(), "Повтор остановлен");
    }
}

/// Выполняет действие под замком тика, если повтор ещё не отменён
fn run_gated<R>(gate: &Mutex<()>, token: &CancellationToken, action: impl FnOnce() -> R) -> Option<R> {
    let _guard = gate.lock();
    if token.is_cancelled() {
        return None;
    }
    Some(action())
}

/// `run_gated` в пуле блокирующих потоков; None если повтор отменён или тик упал
async fn run_blocking<F>(
    id: &str,
    gate: &Arc<Mutex<()>>,
    token: &CancellationToken,
    action: F,
) -> Option<()>
where
    F: FnOnce() + Send + 'static,
{
    let gate = Arc::clone(gate);
    let token = token.clone();
    match tokio::task::spawn_blocking(move || run_gated(&gate, &token, action)).await {
        Ok(result) => result,
        Err(e) => {
            warn!("Тик повтора {} завершился аварийно: {}", id, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let step_count = Arc::clone(&count);
        (count, move || {
            step_count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_step_is_synchronous() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (count, step) = counter();

        let handle = scheduler.start_repeating("volume_up", RepeatTiming::from_millis(350, 30), step);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        scheduler.stop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_after_400ms_yields_two_invocations() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (count, step) = counter();

        let handle = scheduler.start_repeating("next_tab", RepeatTiming::from_millis(350, 120), step);
        time::sleep(Duration::from_millis(400)).await;
        scheduler.stop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        // После stop новых тиков нет
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_interval_after_initial_delay() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (count, step) = counter();

        let handle = scheduler.start_repeating("prev_tab", RepeatTiming::from_millis(350, 120), step);
        // 0, 350, 470, 590, 710
        time::sleep(Duration::from_millis(750)).await;
        scheduler.stop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_initial_delay() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (count, step) = counter();

        let handle = scheduler.start_repeating("volume_down", RepeatTiming::from_millis(350, 30), step);
        time::sleep(Duration::from_millis(100)).await;
        scheduler.stop(handle);
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_once_fires_after_delay() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (count, step) = counter();

        let handle = scheduler.schedule_once("refresh", Duration::from_millis(400), step);
        time::sleep(Duration::from_millis(399)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        scheduler.stop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_once_cancelled() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (count, step) = counter();

        let handle = scheduler.schedule_once("refresh", Duration::from_millis(400), step);
        time::sleep(Duration::from_millis(100)).await;
        scheduler.stop(handle);
        time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    /// Ждёт, пока флаг не станет `true`, не дольше двух секунд
    async fn wait_for(flag: &AtomicBool) {
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while !flag.load(Ordering::SeqCst) {
            assert!(std::time::Instant::now() < deadline, "тик так и не начался");
            time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_waits_for_tick_in_progress() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let in_tick = Arc::new(AtomicBool::new(false));
        let count = Arc::new(AtomicUsize::new(0));

        let (flag, counter) = (Arc::clone(&in_tick), Arc::clone(&count));
        let handle = scheduler.start_repeating("volume_up", RepeatTiming::from_millis(20, 20), move || {
            flag.store(true, Ordering::SeqCst);
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(80));
            flag.store(false, Ordering::SeqCst);
        });

        // Первый вызов синхронный, ждём тик из планировщика
        wait_for(&in_tick).await;
        scheduler.stop(handle);

        assert!(!in_tick.load(Ordering::SeqCst));
        let frozen = count.load(Ordering::SeqCst);
        assert!(frozen >= 2);

        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), frozen);
        assert!(!in_tick.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stop_wait_is_bounded() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let in_tick = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&in_tick);
        let handle = scheduler.schedule_once("refresh", Duration::from_millis(10), move || {
            flag.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(1500));
        });

        wait_for(&in_tick).await;
        let started = std::time::Instant::now();
        scheduler.stop(handle);
        let waited = started.elapsed();

        assert!(waited >= STOP_WAIT_TIMEOUT - Duration::from_millis(50));
        assert!(waited < Duration::from_millis(1200));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_slow_step_does_not_starve_other_repeats() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (tabs, tab_step) = counter();

        // Медленный wpctl: каждый тик громкости занимает 150мс
        let volume = scheduler.start_repeating("volume_up", RepeatTiming::from_millis(50, 30), || {
            std::thread::sleep(Duration::from_millis(150));
        });
        let tab = scheduler.start_repeating("next_tab", RepeatTiming::from_millis(50, 50), tab_step);

        time::sleep(Duration::from_millis(600)).await;
        scheduler.stop(tab);
        scheduler.stop(volume);

        // Около 12 при честном расписании; при голодании было бы 2-3
        assert!(tabs.load(Ordering::SeqCst) >= 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_repeats_do_not_interfere() {
        let scheduler = RepeatScheduler::new(Handle::current());
        let (fast, fast_step) = counter();
        let (slow, slow_step) = counter();

        let fast_handle = scheduler.start_repeating("volume_up", RepeatTiming::from_millis(350, 30), fast_step);
        time::sleep(Duration::from_millis(100)).await;
        let slow_handle = scheduler.start_repeating("next_tab", RepeatTiming::from_millis(350, 120), slow_step);

        // fast: 0, 350, 380, ..., 590 -> 1 + 9; slow (старт на 100): 100, 450, 570
        time::sleep(Duration::from_millis(500)).await;
        scheduler.stop(fast_handle);
        scheduler.stop(slow_handle);

        assert_eq!(fast.load(Ordering::SeqCst), 10);
        assert_eq!(slow.load(Ordering::SeqCst), 3);
    }
}
