use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub text: String,
    #[serde(default)]
    pub done: bool,
}

impl Task {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn with_done(mut self, done: bool) -> Self {
        self.done = done;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_not_done() {
        let task = Task::new("Shave");
        assert_eq!(task.text, "Shave");
        assert!(!task.done);
    }

    #[test]
    fn missing_done_field_defaults_to_false() {
        let task: Task = serde_json::from_str(r#"{"text":"Shave"}"#).unwrap();
        assert_eq!(task, Task::new("Shave"));
    }
}
