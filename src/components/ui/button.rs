use leptos::prelude::*;
use leptos_ui::variants;

variants! {
    Button {
        base: "inline-flex items-center justify-center gap-2 whitespace-nowrap font-semibold transition-all disabled:pointer-events-none disabled:opacity-50 [&_svg]:pointer-events-none [&_svg:not([class*='size-'])]:size-4 shrink-0 [&_svg]:shrink-0 outline-none focus-visible:ring-2 focus-visible:ring-blue-500/50 hover:cursor-pointer active:scale-95 touch-manipulation [-webkit-tap-highlight-color:transparent] select-none",
        variants: {
            variant: {
                Default: "bg-blue-600 text-white shadow-lg shadow-blue-600/20 hover:bg-blue-500",
                Light: "bg-white text-black shadow-xl hover:bg-gray-100",
                Outline: "border border-white/10 text-white hover:bg-white hover:text-black",
                Destructive: "bg-red-500 text-white border-2 border-[#050505] hover:scale-125",
            },
            size: {
                Default: "rounded-2xl px-12 py-4",
                Wide: "w-full rounded-2xl px-6 py-4",
                Pill: "rounded-full px-6 py-2 text-sm",
                Icon: "size-7 rounded-full text-[12px]",
            }
        },
        component: {
            element: button,
            support_href: true,
            support_aria_current: true
        }
    }
}
