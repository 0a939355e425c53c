use crate::errors::Result;
use crate::types::{Area, Item, Node, Relation, Way};

/// Callbacks for items streamed out of an input source.
///
/// Every callback defaults to doing nothing, so implementors only override
/// what they care about.
pub trait Handler {
    /// Dispatches an item to the type-specific callback.
    fn item(&mut self, item: &Item) -> Result<()> {
        match item {
            Item::Node(node) => self.node(node),
            Item::Way(way) => self.way(way),
            Item::Relation(relation) => self.relation(relation),
            Item::Area(area) => self.area(area),
        }
    }

    fn node(&mut self, _node: &Node) -> Result<()> {
        Ok(())
    }

    fn way(&mut self, _way: &Way) -> Result<()> {
        Ok(())
    }

    fn relation(&mut self, _relation: &Relation) -> Result<()> {
        Ok(())
    }

    fn area(&mut self, _area: &Area) -> Result<()> {
        Ok(())
    }

    /// Called once after the last item.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Feeds every item to `handler`, then calls [`Handler::flush`].
///
/// Stops at the first error, whether it comes from the source or the handler.
pub fn apply<I, H>(items: I, handler: &mut H) -> Result<()>
where
    I: IntoIterator<Item = Result<Item>>,
    H: Handler + ?Sized,
{
    for item in items {
        handler.item(&item?)?;
    }
    handler.flush()
}
