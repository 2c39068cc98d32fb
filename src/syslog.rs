//! 系统日志监视
//!
//! 生产者可以在任意线程写入日志消息；批量回调只会在拥有监视器的线程上、
//! 由 [`BatchingLogMonitor::deliver_pending`] 触发。回调不要求 `Send`，
//! 因此监视器本身不能被移动到其他线程，回调线程由类型系统保证。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use chrono::{DateTime, Local};

/// 一条系统日志
#[derive(Debug, Clone, PartialEq)]
pub struct SystemLogMessage {
    pub date: DateTime<Local>,
    pub sender: String,
    pub message_text: String,
    /// 单调递增的消息序号
    pub message_id: u64,
}

impl fmt::Display for SystemLogMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.date.format("%H:%M:%S%.3f"),
            self.sender,
            self.message_text
        )
    }
}

/// 批量更新回调
pub type UpdateHandler = Box<dyn FnMut(Vec<SystemLogMessage>)>;

/// 日志来源控制器
pub trait LogController {
    fn with_update_handler(handler: UpdateHandler) -> Self
    where
        Self: Sized;

    /// 开始监视，成功返回 true
    fn start_monitoring(&mut self) -> bool;
}

/// 可跨线程使用的日志写入端
#[derive(Clone)]
pub struct LogProducer {
    sender: Sender<SystemLogMessage>,
    next_id: Arc<AtomicU64>,
}

impl LogProducer {
    /// 写入一条消息；监视器已被丢弃时返回 false
    pub fn log(&self, sender: &str, text: &str) -> bool {
        let message = SystemLogMessage {
            date: Local::now(),
            sender: sender.to_string(),
            message_text: text.to_string(),
            message_id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        self.sender.send(message).is_ok()
    }
}

/// 缓冲日志并在拥有线程上批量投递的监视器
pub struct BatchingLogMonitor {
    sender: Sender<SystemLogMessage>,
    receiver: Receiver<SystemLogMessage>,
    next_id: Arc<AtomicU64>,
    handler: UpdateHandler,
    monitoring: bool,
}

impl BatchingLogMonitor {
    /// 创建写入端
    pub fn producer(&self) -> LogProducer {
        LogProducer { sender: self.sender.clone(), next_id: Arc::clone(&self.next_id) }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitoring
    }

    /// 把已缓冲的消息作为一批投递给回调
    ///
    /// # 返回
    /// 投递的消息数量；未开始监视或没有新消息时为 0
    pub fn deliver_pending(&mut self) -> usize {
        if !self.monitoring {
            return 0;
        }

        let batch: Vec<SystemLogMessage> = self.receiver.try_iter().collect();
        let count = batch.len();
        if count > 0 {
            tracing::debug!(count, "delivering log batch");
            (self.handler)(batch);
        }
        count
    }
}

impl LogController for BatchingLogMonitor {
    fn with_update_handler(handler: UpdateHandler) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            next_id: Arc::new(AtomicU64::new(1)),
            handler,
            monitoring: false,
        }
    }

    fn start_monitoring(&mut self) -> bool {
        if !self.monitoring {
            tracing::info!("system log monitoring started");
        }
        self.monitoring = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread;

    fn monitor() -> (BatchingLogMonitor, Rc<RefCell<Vec<(thread::ThreadId, Vec<u64>)>>>) {
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&batches);
        let monitor = BatchingLogMonitor::with_update_handler(Box::new(move |messages| {
            let ids = messages.iter().map(|m| m.message_id).collect();
            sink.borrow_mut().push((thread::current().id(), ids));
        }));
        (monitor, batches)
    }

    #[test]
    fn test_batches_delivered_on_owner_thread() {
        let (mut monitor, batches) = monitor();
        assert!(monitor.start_monitoring());

        let producers: Vec<_> = (0..3)
            .map(|i| {
                let producer = monitor.producer();
                thread::spawn(move || {
                    for j in 0..4 {
                        assert!(producer.log("worker", &format!("{}-{}", i, j)));
                    }
                })
            })
            .collect();
        for handle in producers {
            handle.join().unwrap();
        }

        assert_eq!(monitor.deliver_pending(), 12);
        assert_eq!(monitor.deliver_pending(), 0);

        let batches = batches.borrow();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, thread::current().id());
        let mut ids = batches[0].1.clone();
        ids.sort();
        assert_eq!(ids, (1..=12).collect::<Vec<u64>>());
    }

    #[test]
    fn test_buffers_until_started() {
        let (mut monitor, batches) = monitor();
        monitor.producer().log("app", "early");
        assert_eq!(monitor.deliver_pending(), 0);

        monitor.start_monitoring();
        assert_eq!(monitor.deliver_pending(), 1);
        assert_eq!(batches.borrow().len(), 1);
    }

    #[test]
    fn test_message_display() {
        let (monitor, _) = monitor();
        monitor.producer().log("SpringBoard", "hello");
        let message = monitor.receiver.try_recv().unwrap();
        let text = message.to_string();
        assert!(text.ends_with("[SpringBoard] hello"));
    }
}
