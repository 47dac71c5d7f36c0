// Author: Mode Control Entity contributors
// License: MIT

//! Generic publish-filter-subscribe primitive, modeled on the "datapipe"
//! design note: the source keeps many process-wide inputs (system state,
//! charger, call, proximity...) behind a shared observer channel with
//! filters that may transform a value before it is latched and triggers
//! that run after it is. Filters and triggers run synchronously during
//! `publish`, on whatever thread calls it (the single cooperative main
//! loop, in this crate).

type Filter<T> = Box<dyn Fn(T) -> T + Send>;
type Trigger<T> = Box<dyn FnMut(&T) + Send>;

pub struct Datapipe<T: Clone> {
    value: T,
    filters: Vec<Filter<T>>,
    triggers: Vec<Trigger<T>>,
}

impl<T: Clone> Datapipe<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: initial,
            filters: Vec::new(),
            triggers: Vec::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.clone()
    }

    /// Register a filter, applied left-to-right in registration order
    /// before the value is latched.
    pub fn filter(&mut self, f: impl Fn(T) -> T + Send + 'static) {
        self.filters.push(Box::new(f));
    }

    /// Register an output trigger, run after the value is latched.
    pub fn subscribe(&mut self, f: impl FnMut(&T) + Send + 'static) {
        self.triggers.push(Box::new(f));
    }

    /// Publish a new value: run it through filters, latch it, then run
    /// triggers with the latched value.
    pub fn publish(&mut self, value: T) {
        let mut v = value;
        for f in &self.filters {
            v = f(v);
        }
        self.value = v.clone();
        for t in &mut self.triggers {
            t(&v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_run_before_triggers_see_the_value() {
        let mut pipe = Datapipe::new(0i32);
        pipe.filter(|v| v.max(0));

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        pipe.subscribe(move |v| seen2.lock().unwrap().push(*v));

        pipe.publish(-5);
        pipe.publish(7);

        assert_eq!(pipe.get(), 7);
        assert_eq!(*seen.lock().unwrap(), vec![0, 7]);
    }
}
