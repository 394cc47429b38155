//! 关注品种注册表
//!
//! 品种元数据和各数据源的代码映射来自外部配置，这里只负责查找

use crate::config::SymbolConfig;

#[derive(Debug, Clone, Default)]
pub struct SymbolRegistry {
    symbols: Vec<SymbolConfig>,
}

impl SymbolRegistry {
    pub fn new(symbols: Vec<SymbolConfig>) -> Self {
        Self { symbols }
    }

    /// 按代码查找（忽略大小写）
    pub fn get(&self, symbol: &str) -> Option<&SymbolConfig> {
        self.symbols
            .iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(symbol))
    }

    /// 按配置顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &SymbolConfig> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }
}
