//! Flattened handler table.
//!
//! Built once at startup from every plugin's descriptor list. Handlers
//! are stable-sorted by phase, so within a phase the walk order is
//! plugin registration order, then descriptor order.

use crate::plugins::{HandlerSpec, Plugin};

/// One descriptor bound to the plugin that owns it.
#[derive(Debug)]
pub struct RegisteredHandler {
    /// Index of the owning plugin.
    pub plugin: usize,
    /// Position within that plugin's own descriptor list.
    pub spec_index: usize,
    /// The descriptor itself.
    pub spec: HandlerSpec,
}

/// The dispatch table the router walks per event.
#[derive(Debug, Default)]
pub struct Registry {
    handlers: Vec<RegisteredHandler>,
}

impl Registry {
    pub fn build(plugins: &[Box<dyn Plugin>]) -> Self {
        let mut handlers = Vec::new();
        for (plugin, p) in plugins.iter().enumerate() {
            for (spec_index, spec) in p.descriptors().into_iter().enumerate() {
                handlers.push(RegisteredHandler {
                    plugin,
                    spec_index,
                    spec,
                });
            }
        }
        handlers.sort_by_key(|h| h.spec.phase);
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn get(&self, index: usize) -> &RegisteredHandler {
        &self.handlers[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredHandler> {
        self.handlers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::context::PluginCtx;
    use crate::error::HandlerResult;
    use crate::event::{Event, EventType};
    use crate::plugins::Phase;
    use async_trait::async_trait;

    struct Stub(Vec<HandlerSpec>);

    #[async_trait]
    impl Plugin for Stub {
        fn name(&self) -> &'static str {
            "stub"
        }
        fn descriptors(&self) -> Vec<HandlerSpec> {
            self.0.clone()
        }
        async fn handle(
            &mut self,
            _ctx: &mut PluginCtx<'_>,
            _spec_index: usize,
            _event: &Event,
        ) -> HandlerResult {
            Ok(())
        }
    }

    #[test]
    fn phases_order_the_walk_and_sort_is_stable() {
        let kinds = [EventType::ChannelMessage];
        let a = Stub(vec![
            HandlerSpec::command("a-late", "al", &kinds).phase(Phase::Late),
            HandlerSpec::awareness("a-setup", Phase::Setup),
        ]);
        let b = Stub(vec![HandlerSpec::command("b-normal", "bn", &kinds)]);
        let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(a), Box::new(b)];

        let reg = Registry::build(&plugins);
        let names: Vec<_> = reg.iter().map(|h| h.spec.name).collect();
        assert_eq!(names, vec!["a-setup", "b-normal", "a-late"]);
        assert_eq!(reg.get(0).plugin, 0);
        assert_eq!(reg.get(0).spec_index, 1);
        assert_eq!(reg.get(1).plugin, 1);
    }
}
