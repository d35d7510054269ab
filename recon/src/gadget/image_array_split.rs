use ndarray::s;
use mr_data::Image;
use crate::error::Result;
use crate::gadget::{pass, unknown, Gadget, Message};

pub struct ImageArraySplitGadget;

impl ImageArraySplitGadget {
    pub fn new() -> Self {
        Self
    }
}

impl Gadget for ImageArraySplitGadget {
    fn class_name(&self) -> &'static str {
        "ImageArraySplitGadget"
    }

    fn set_property(&mut self,key:&str,_value:&str) -> Result<()> {
        Err(unknown(self.class_name(),key))
    }

    fn process(&mut self,msg:Message,out:&mut Vec<Message>) -> Result<()> {
        match msg {
            Message::ImageArray(array) => {
                for (n,head) in array.headers.into_iter().enumerate() {
                    let data = array.data.slice(s![n,..,..,..,..]).to_owned();
                    out.push(Message::Image(Image::new(head,data)?));
                }
                Ok(())
            }
            other => pass(other,out)
        }
    }
}
