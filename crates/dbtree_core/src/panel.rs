use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{TableDetail, TableKey};

/// Tabs of the table detail panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailTab {
    #[default]
    Columns,
    Indexes,
}

impl DetailTab {
    pub fn label(self) -> &'static str {
        match self {
            DetailTab::Columns => "Columns",
            DetailTab::Indexes => "Indexes",
        }
    }
}

/// Table shown in the detail panel.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedTable {
    pub key: TableKey,
    pub detail: Arc<TableDetail>,
}

impl SelectedTable {
    pub fn schema(&self) -> &str {
        &self.key.schema
    }

    pub fn table(&self) -> &str {
        &self.key.table
    }
}

/// State behind the bottom detail panel.
///
/// Holds at most one table. Closing the panel drops the selection but not
/// the cached detail it came from.
#[derive(Debug, Clone, Default)]
pub struct DetailPanelState {
    selected: Option<SelectedTable>,
    open: bool,
    active_tab: DetailTab,
}

impl DetailPanelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shows a table and opens the panel on the columns tab.
    pub fn show(&mut self, key: TableKey, detail: Arc<TableDetail>) {
        self.selected = Some(SelectedTable { key, detail });
        self.open = true;
        self.active_tab = DetailTab::Columns;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.selected = None;
    }

    pub fn set_open(&mut self, open: bool) {
        self.open = open;
    }

    pub fn set_active_tab(&mut self, tab: DetailTab) {
        self.active_tab = tab;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn selected(&self) -> Option<&SelectedTable> {
        self.selected.as_ref()
    }

    pub fn active_tab(&self) -> DetailTab {
        self.active_tab
    }

    /// Tab caption with the item count of the selected table, e.g. "Columns (3)".
    pub fn tab_label(&self, tab: DetailTab) -> String {
        let count = self.selected.as_ref().map(|selected| match tab {
            DetailTab::Columns => selected.detail.columns.len(),
            DetailTab::Indexes => selected.detail.indexes.len(),
        });

        match count {
            Some(count) => format!("{} ({})", tab.label(), count),
            None => tab.label().to_string(),
        }
    }
}
