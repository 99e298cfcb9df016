/// Runtime tag of a sense channel, passed to resistance layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Vision,
    Smell,
    Noise,
    Touch,
}

impl ChannelKind {
    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::Vision => "vision",
            ChannelKind::Smell => "smell",
            ChannelKind::Noise => "noise",
            ChannelKind::Touch => "touch",
        }
    }
}

/// Compile-time sense channel. Caches and systems are generic over the
/// channel so each one gets its own monomorphized instance.
pub trait SenseChannel: Copy + Default + Send + Sync + 'static {
    const KIND: ChannelKind;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vision;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Smell;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Noise;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Touch;

impl SenseChannel for Vision {
    const KIND: ChannelKind = ChannelKind::Vision;
}

impl SenseChannel for Smell {
    const KIND: ChannelKind = ChannelKind::Smell;
}

impl SenseChannel for Noise {
    const KIND: ChannelKind = ChannelKind::Noise;
}

impl SenseChannel for Touch {
    const KIND: ChannelKind = ChannelKind::Touch;
}
