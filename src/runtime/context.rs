// In src/runtime/context.rs

use crate::analyzer::Environ;
use crate::parser::ast::Phrase;
use crate::runtime::Frame;
use crate::utils::Location;
use std::rc::Rc;

/// 一个错误的“回溯配方”：在出错点临时构造，立即交给 `Exception::new` 消费。
///
/// 只借用，不持有任何东西，所以不可能活得比出错的那次调用更久。
#[derive(Debug, Clone, Copy)]
pub enum Context<'a> {
    /// 没有可归属的源码位置
    Empty,
    /// 责任在当前调用本身：沿 `frame → caller → …` 列出每一层的调用点
    AtFrame(&'a Rc<Frame>),
    /// 责任在某个具体的 Phrase，随后是帧的调用链
    AtPhrase(&'a Phrase, Option<&'a Rc<Frame>>),
    /// 已经算好的位置（例如合成出来的范围），随后是帧的调用链
    AtLocation(&'a Location, Option<&'a Rc<Frame>>),
}

impl<'a> Context<'a> {
    /// 分析期使用的形式：分析期没有活动帧，只有编译时传入的外层帧（如果有）。
    pub fn at_environ(phrase: &'a Phrase, env: &'a Environ<'a>) -> Self {
        Context::AtPhrase(phrase, env.root_frame())
    }

    /// 展开为位置列表，最内层在前。
    pub fn get_locations(&self) -> Vec<Location> {
        let mut locations = Vec::new();
        match self {
            Context::Empty => {}
            Context::AtFrame(frame) => push_call_chain(frame, &mut locations),
            Context::AtPhrase(phrase, frame) => {
                locations.push(phrase.location.clone());
                if let Some(frame) = frame {
                    push_call_chain(frame, &mut locations);
                }
            }
            Context::AtLocation(location, frame) => {
                locations.push((*location).clone());
                if let Some(frame) = frame {
                    push_call_chain(frame, &mut locations);
                }
            }
        }
        locations
    }
}

fn push_call_chain(frame: &Rc<Frame>, locations: &mut Vec<Location>) {
    let mut next = Some(frame.clone());
    while let Some(frame) = next {
        if let Some(phrase) = &frame.call_phrase {
            locations.push(phrase.location.clone());
        }
        next = frame.caller.as_ref().and_then(|caller| caller.upgrade());
    }
}
