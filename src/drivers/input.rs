// Debounced input from the three front buttons (A, B, C)
//
// The board samples the GPIO levels and hands the raw reading in with a
// millisecond timestamp; everything below is pure state so it runs the
// same on the host. One button at a time: when several are held the
// board reports the first in A, B, C order.
//
// 30ms debounce, 1s long press, 150ms repeat.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    A,
    B,
    C,
}

impl Button {
    /// First held button in panel order, from active-low levels.
    pub fn from_levels(a_low: bool, b_low: bool, c_low: bool) -> Option<Self> {
        if a_low {
            Some(Self::A)
        } else if b_low {
            Some(Self::B)
        } else if c_low {
            Some(Self::C)
        } else {
            None
        }
    }
}

const DEBOUNCE_MS: u64 = 30;
const LONG_PRESS_MS: u64 = 1000;
const REPEAT_MS: u64 = 150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Press(Button),
    Release(Button),
    LongPress(Button),
    Repeat(Button),
}

struct EventQueue {
    buf: [Option<Event>; 2],
}

impl EventQueue {
    const fn new() -> Self {
        Self { buf: [None; 2] }
    }

    fn push(&mut self, ev: Event) {
        for slot in self.buf.iter_mut() {
            if slot.is_none() {
                *slot = Some(ev);
                return;
            }
        }
    }

    fn pop(&mut self) -> Option<Event> {
        for slot in self.buf.iter_mut() {
            if let Some(ev) = slot.take() {
                return Some(ev);
            }
        }
        None
    }

    fn is_empty(&self) -> bool {
        self.buf.iter().all(|s| s.is_none())
    }
}

pub struct Debouncer {
    stable: Option<Button>,
    candidate: Option<Button>,
    candidate_since: u64,
    press_since: u64,
    long_press_fired: bool,
    last_repeat: u64,
    queue: EventQueue,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    pub const fn new() -> Self {
        Self {
            stable: None,
            candidate: None,
            candidate_since: 0,
            press_since: 0,
            long_press_fired: false,
            last_repeat: 0,
            queue: EventQueue::new(),
        }
    }

    /// Feed one raw sample taken at `now_ms`. A release followed by a
    /// press (button swap) yields two events on consecutive polls.
    pub fn poll(&mut self, raw: Option<Button>, now_ms: u64) -> Option<Event> {
        if !self.queue.is_empty() {
            return self.queue.pop();
        }

        if raw != self.candidate {
            self.candidate = raw;
            self.candidate_since = now_ms;
        }

        let debounced = if now_ms.saturating_sub(self.candidate_since) >= DEBOUNCE_MS {
            self.candidate
        } else {
            self.stable
        };

        if debounced != self.stable {
            if let Some(old) = self.stable {
                self.queue.push(Event::Release(old));
            }
            if let Some(new) = debounced {
                self.queue.push(Event::Press(new));
                self.press_since = now_ms;
                self.long_press_fired = false;
                self.last_repeat = now_ms;
            }
            self.stable = debounced;
            return self.queue.pop();
        }

        if let Some(btn) = self.stable {
            let held = now_ms.saturating_sub(self.press_since);

            if !self.long_press_fired && held >= LONG_PRESS_MS {
                self.long_press_fired = true;
                self.last_repeat = now_ms;
                return Some(Event::LongPress(btn));
            }

            if self.long_press_fired && now_ms.saturating_sub(self.last_repeat) >= REPEAT_MS {
                self.last_repeat = now_ms;
                return Some(Event::Repeat(btn));
            }
        }

        None
    }
}
