use crate::bus::ViewId;

pub const ROOT_LABEL: &str = "pipelines";

/// Stack of visited views and the breadcrumb that goes with them
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStack {
    views: Vec<ViewId>,
    labels: Vec<String>,
    index: usize,
}

impl Default for NavigationStack {
    fn default() -> Self {
        Self::new()
    }
}

impl NavigationStack {
    pub fn new() -> Self {
        Self {
            views: vec![ViewId::Pipelines],
            labels: vec![ROOT_LABEL.to_string()],
            index: 0,
        }
    }

    pub fn current(&self) -> ViewId {
        self.views[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn depth(&self) -> usize {
        self.index + 1
    }

    pub fn current_label(&self) -> &str {
        &self.labels[self.index]
    }

    pub fn push(&mut self, id: ViewId, label: impl Into<String>) {
        self.views.truncate(self.index + 1);
        self.labels.truncate(self.index + 1);
        self.views.push(id);
        self.labels.push(label.into());
        self.index += 1;
    }

    /// Go back one level; returns false when already at the root
    pub fn pop(&mut self) -> bool {
        if self.index == 0 {
            return false;
        }
        self.views.truncate(self.index);
        self.labels.truncate(self.index);
        self.index -= 1;
        true
    }

    pub fn labels(&self) -> &[String] {
        &self.labels[..=self.index]
    }

    pub fn path(&self) -> String {
        self.labels().join("/")
    }
}

/// Keep the tail of `path` so it fits in `width` columns
pub fn truncate_path(path: &str, width: usize) -> String {
    let count = path.chars().count();
    if count <= width {
        return path.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let keep = width - 1;
    let tail: String = path.chars().skip(count - keep).collect();
    format!("…{tail}")
}
