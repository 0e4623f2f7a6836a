use std::collections::VecDeque;
use std::mem;

use crate::template::TemplateRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredTask {
    GeneratePreview(TemplateRef),
}

/// One-shot continuations that run after the current host update cycle, on
/// the same thread. Tasks queued while draining wait for the next drain.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    tasks: VecDeque<DeferredTask>,
}

impl DeferredQueue {
    pub fn push(&mut self, task: DeferredTask) {
        if !self.tasks.contains(&task) {
            self.tasks.push_back(task);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn take_all(&mut self) -> VecDeque<DeferredTask> {
        mem::take(&mut self.tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_tasks_collapse_and_order_is_fifo() {
        let mut queue = DeferredQueue::default();
        let rock = DeferredTask::GeneratePreview(TemplateRef::new("decor/Rock"));
        let tree = DeferredTask::GeneratePreview(TemplateRef::new("decor/Tree"));
        queue.push(rock.clone());
        queue.push(tree.clone());
        queue.push(rock.clone());

        assert_eq!(queue.len(), 2);
        let drained = queue.take_all().into_iter().collect::<Vec<_>>();
        assert_eq!(drained, vec![rock, tree]);
        assert!(queue.is_empty());
    }
}
