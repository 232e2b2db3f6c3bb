// src/system.rs

//! 编译器和求值器共享的环境：配置以及内建名字空间。

use crate::runtime::{Value, builtins};
use crate::utils::AtomMap;
use std::rc::Rc;

/// 名字到常量值的映射，用作最外层的内建作用域。
pub type Namespace = AtomMap<Value>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// 解释执行时允许的最大调用深度，超过时报告 `StackOverflow`。
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: 1000,
        }
    }
}

#[derive(Debug)]
pub struct System {
    pub config: Config,
    pub builtins: Namespace,
}

impl System {
    pub fn new(config: Config) -> Rc<Self> {
        Rc::new(Self {
            config,
            builtins: builtins::namespace(),
        })
    }
}

impl Default for System {
    fn default() -> Self {
        Self {
            config: Config::default(),
            builtins: builtins::namespace(),
        }
    }
}
