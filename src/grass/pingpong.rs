//! Arena-of-two with a current index.

/// Two slots of a double-buffered resource. `current` holds the resolved
/// state; `next` is the write target of the step in flight. Swapping
/// exchanges roles by index, never by copying.
#[derive(Debug)]
pub struct PingPong<T> {
    slots: [T; 2],
    current: usize,
}

impl<T> PingPong<T> {
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            current: 0,
        }
    }

    pub fn current(&self) -> &T {
        &self.slots[self.current]
    }

    pub fn next(&self) -> &T {
        &self.slots[1 - self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn get(&self, index: usize) -> &T {
        &self.slots[index]
    }

    /// Call only after the step writing `next` has been recorded.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}
